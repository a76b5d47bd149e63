//! Envelope detection and unwrapping
//!
//! Automation services wrap the payload of interest in a varying number of
//! layers: markdown fences around the JSON text, a one-element array, and a
//! `json` property. Everything here runs synchronously and never fails; text
//! that is not JSON degrades into `{content, parseFailed: true}`.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Top-level keys that mark an object as a payload rather than an envelope
pub const PAYLOAD_KEYS: &[&str] = &[
    "quick_publish",
    "single_tweet",
    "thread",
    "twitter_post",
    "linkedin_post",
    "instagram_post",
    "facebook_post",
    "hashtag_strategy",
    "hashtags",
    "content",
    "summary",
    "financialSummary",
    "results",
    "processingDetails",
    "qualityMetrics",
    "recommendations",
    "imageUrl",
    "data",
];

/// Outermost envelope the payload was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeShape {
    /// `[{json: {...}}]` or `[{...}]`
    ArrayWrapped,
    /// `{json: {...}}`
    ObjectWrapped,
    /// The payload object itself
    Flat,
    /// Text that did not parse as JSON
    Degraded,
    /// Binary body, no JSON at all
    BinaryBlob,
}

/// An unwrapped payload object
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub value: Value,
    pub shape: EnvelopeShape,
    pub parse_failed: bool,
}

impl Payload {
    /// Placeholder payload for a binary body of `len` bytes
    pub fn binary(len: usize) -> Self {
        let mut obj = Map::new();
        obj.insert("byteLength".to_string(), Value::from(len));
        Self {
            value: Value::Object(obj),
            shape: EnvelopeShape::BinaryBlob,
            parse_failed: false,
        }
    }

    /// The payload object
    pub fn object(&self) -> Option<&Map<String, Value>> {
        self.value.as_object()
    }

    /// True if the payload carries something worth extracting from.
    ///
    /// Any key at all counts for parsed JSON. Degraded text never counts.
    /// Binary bodies count when they are not empty.
    pub fn is_usable(&self) -> bool {
        match self.shape {
            EnvelopeShape::BinaryBlob => self
                .value
                .get("byteLength")
                .and_then(Value::as_u64)
                .is_some_and(|n| n > 0),
            EnvelopeShape::Degraded => false,
            _ => self.object().is_some_and(|o| !o.is_empty()),
        }
    }
}

/// Remove a surrounding markdown code fence, with or without a language tag
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) if is_fence_tag(&rest[..newline]) => &rest[newline + 1..],
        _ => rest.strip_prefix("json").unwrap_or(rest),
    };
    body.trim().trim_end_matches("```").trim()
}

fn is_fence_tag(tag: &str) -> bool {
    tag.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Strip fences, parse and unwrap raw response text.
///
/// Running this on the serialized output of a previous call yields the same
/// object.
pub fn unwrap_text(raw: &str) -> Payload {
    let stripped = strip_code_fence(raw);
    match serde_json::from_str::<Value>(stripped) {
        Ok(Value::String(inner)) => match serde_json::from_str::<Value>(strip_code_fence(&inner)) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => unwrap_value(value),
            _ => flat_content(inner),
        },
        Ok(value) => unwrap_value(value),
        Err(err) => {
            warn!(error = %err, len = raw.len(), "webhook response is not JSON, degrading");
            Payload {
                value: degraded(raw),
                shape: EnvelopeShape::Degraded,
                parse_failed: true,
            }
        }
    }
}

/// Unwrap an already-parsed value
pub fn unwrap_value(value: Value) -> Payload {
    let mut shape = None;
    let mut current = value;
    // Every pass removes one layer, so this reaches a fixed point.
    loop {
        let (next, layer) = match current {
            Value::Array(items) => {
                let first = items.into_iter().next();
                match first {
                    Some(Value::Object(mut obj)) if obj.contains_key("json") => {
                        let inner = obj.remove("json").unwrap_or(Value::Null);
                        (inner, EnvelopeShape::ArrayWrapped)
                    }
                    Some(item) => (item, EnvelopeShape::ArrayWrapped),
                    None => (Value::Object(Map::new()), EnvelopeShape::ArrayWrapped),
                }
            }
            Value::Object(mut obj) if is_json_envelope(&obj) => {
                let inner = obj.remove("json").unwrap_or(Value::Null);
                (inner, EnvelopeShape::ObjectWrapped)
            }
            other => {
                current = other;
                break;
            }
        };
        shape.get_or_insert(layer);
        current = next;
    }

    let value = match current {
        Value::Object(_) => current,
        Value::String(text) => return flat_content(text),
        Value::Null => Value::Object(Map::new()),
        scalar => content_object(Value::String(scalar.to_string())),
    };
    let shape = shape.unwrap_or(EnvelopeShape::Flat);
    debug!(?shape, "unwrapped webhook payload");
    Payload {
        value,
        shape,
        parse_failed: false,
    }
}

fn is_json_envelope(obj: &Map<String, Value>) -> bool {
    obj.contains_key("json") && !PAYLOAD_KEYS.iter().any(|k| obj.contains_key(*k))
}

fn flat_content(text: String) -> Payload {
    Payload {
        value: content_object(Value::String(text)),
        shape: EnvelopeShape::Flat,
        parse_failed: false,
    }
}

fn content_object(content: Value) -> Value {
    let mut obj = Map::new();
    obj.insert("content".to_string(), content);
    Value::Object(obj)
}

fn degraded(raw: &str) -> Value {
    let mut obj = Map::new();
    obj.insert("content".to_string(), Value::String(raw.to_string()));
    obj.insert("parseFailed".to_string(), Value::Bool(true));
    Value::Object(obj)
}
