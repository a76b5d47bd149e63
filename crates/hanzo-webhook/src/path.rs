//! Path expressions over JSON payloads
//!
//! A path is a dotted list of segments: `quick_publish.thread_ready[0]`,
//! `thread.tweets[0].content`, `*_post.hashtags`. A `*` inside a key segment
//! matches any run of characters, so `*_post` matches `linkedin_post`.
//! Glob segments try candidate keys in map order and stop at the first one
//! whose remaining path resolves.

use serde_json::Value;
use std::fmt;

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object key
    Key(String),
    /// Object key pattern containing `*`
    Glob(String),
    /// Array index
    Index(usize),
}

/// A parsed lookup path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    source: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parse a path expression.
    ///
    /// Rule tables are static, so a malformed index is kept as a literal key
    /// rather than rejected.
    pub fn parse(expr: &str) -> Self {
        let mut segments = Vec::new();
        for part in expr.split('.').filter(|p| !p.is_empty()) {
            let (key, rest) = match part.find('[') {
                Some(i) => (&part[..i], &part[i..]),
                None => (part, ""),
            };
            if !key.is_empty() {
                segments.push(key_segment(key));
            }
            let mut rest = rest;
            while let Some(stripped) = rest.strip_prefix('[') {
                let Some(end) = stripped.find(']') else {
                    segments.push(Segment::Key(rest.to_string()));
                    break;
                };
                match stripped[..end].parse::<usize>() {
                    Ok(i) => segments.push(Segment::Index(i)),
                    Err(_) => segments.push(Segment::Key(stripped[..end].to_string())),
                }
                rest = &stripped[end + 1..];
            }
        }
        Self {
            source: expr.to_string(),
            segments,
        }
    }

    /// The parsed segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The expression this path was parsed from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Resolve against `root`, returning the first value the path reaches
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        resolve_from(root, &self.segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl From<&str> for FieldPath {
    fn from(expr: &str) -> Self {
        FieldPath::parse(expr)
    }
}

fn key_segment(key: &str) -> Segment {
    if key.contains('*') {
        Segment::Glob(key.to_string())
    } else {
        Segment::Key(key.to_string())
    }
}

fn resolve_from<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let Some((head, tail)) = segments.split_first() else {
        return Some(value);
    };
    match head {
        Segment::Key(key) => resolve_from(value.as_object()?.get(key)?, tail),
        Segment::Index(i) => resolve_from(value.as_array()?.get(*i)?, tail),
        Segment::Glob(pattern) => value
            .as_object()?
            .iter()
            .filter(|(k, _)| glob_match(pattern, k))
            .find_map(|(_, v)| resolve_from(v, tail)),
    }
}

/// Match `text` against a pattern where `*` stands for any substring
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }
    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !text.starts_with(first) || text.len() < first.len() + last.len() {
        return false;
    }
    let mut cursor = first.len();
    let end = text.len() - last.len();
    for middle in &parts[1..parts.len() - 1] {
        match text[cursor..end].find(middle) {
            Some(found) => cursor += found + middle.len(),
            None => return false,
        }
    }
    text[end..] == *last
}
