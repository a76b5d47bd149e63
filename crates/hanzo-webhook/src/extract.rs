//! Platform field extraction
//!
//! Each `(platform, field)` pair owns an ordered list of lookup paths. One
//! resolver walks the list, records every attempt in the extraction trace and
//! stops at the first value that passes the field's acceptance test. The
//! lists reflect the field names upstream payloads have used over time, with
//! quick-publish variants first and generic fallbacks last.

use crate::config::WebhookConfig;
use crate::envelope::unwrap_value;
use crate::path::FieldPath;
use crate::record::{GeneratedContentRecord, ReadyText, VisualStrategy};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Social platforms with a content generation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Linkedin,
    Instagram,
    Facebook,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Twitter,
        Platform::Linkedin,
        Platform::Instagram,
        Platform::Facebook,
    ];

    /// Lowercase name used in payload keys (`linkedin_post`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twitter" | "x" => Ok(Platform::Twitter),
            "linkedin" => Ok(Platform::Linkedin),
            "instagram" => Ok(Platform::Instagram),
            "facebook" => Ok(Platform::Facebook),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// Fields with their own fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ReadyToPostText,
    Hashtags,
    EngagementScore,
    OptimalTime,
    VisualStrategy,
}

impl Field {
    /// Name used in trace entries
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::ReadyToPostText => "ready_to_post_text",
            Field::Hashtags => "hashtags",
            Field::EngagementScore => "engagement_score",
            Field::OptimalTime => "optimal_time",
            Field::VisualStrategy => "visual_strategy",
        }
    }
}

/// How a matched hashtag value is tokenized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Free text: only `#`-prefixed tokens count
    Text,
    /// Explicit tag list: bare tokens are tags and get a `#` prefix
    TagList,
}

/// One entry of a fallback chain
#[derive(Debug, Clone)]
pub struct Rule {
    pub path: FieldPath,
    pub kind: RuleKind,
}

impl Rule {
    fn text(expr: &str) -> Self {
        Self {
            path: FieldPath::parse(expr),
            kind: RuleKind::Text,
        }
    }

    fn tags(expr: &str) -> Self {
        Self {
            path: FieldPath::parse(expr),
            kind: RuleKind::TagList,
        }
    }
}

/// Fallback chains for one platform
#[derive(Debug, Clone)]
pub struct RuleTable {
    pub platform: Platform,
    pub ready_to_post_text: Vec<Rule>,
    pub hashtags: Vec<Rule>,
    pub engagement_score: Vec<Rule>,
    pub optimal_time: Vec<Rule>,
    pub visual_strategy: Vec<Rule>,
}

impl RuleTable {
    /// The chain for a field
    pub fn rules(&self, field: Field) -> &[Rule] {
        match field {
            Field::ReadyToPostText => &self.ready_to_post_text,
            Field::Hashtags => &self.hashtags,
            Field::EngagementScore => &self.engagement_score,
            Field::OptimalTime => &self.optimal_time,
            Field::VisualStrategy => &self.visual_strategy,
        }
    }
}

const GENERIC_TEXT: &[&str] = &[
    "quick_publish.post_ready",
    "ready_to_post",
    "post_ready",
    "content",
    "text",
    "output",
];

const TWITTER_TEXT: &[&str] = &[
    "quick_publish.single_tweet_ready",
    "single_tweet.ready_to_post",
    "single_tweet.content",
    "quick_publish.thread_ready[0]",
    "thread.ready_to_post[0]",
    "thread.tweets[0]",
    "thread.tweets[0].content",
    "twitter_post.ready_to_post",
    "twitter_post.content",
];

const LINKEDIN_TEXT: &[&str] = &[
    "quick_publish.post_ready",
    "quick_publish.full_post_ready",
    "linkedin_post.ready_to_post",
    "linkedin_post.post_ready",
    "linkedin_post.full_post",
    "linkedin_post.content",
    "post.content",
];

const INSTAGRAM_TEXT: &[&str] = &[
    "quick_publish.caption_ready",
    "quick_publish.post_ready",
    "instagram_post.caption_ready",
    "instagram_post.full_caption",
    "instagram_post.ready_to_post",
    "instagram_post.caption",
    "instagram_post.content",
    "caption",
];

const FACEBOOK_TEXT: &[&str] = &[
    "quick_publish.post_ready",
    "quick_publish.full_post_ready",
    "facebook_post.ready_to_post",
    "facebook_post.post_ready",
    "facebook_post.full_post",
    "facebook_post.content",
    "post.content",
];

static TABLES: Lazy<[RuleTable; 4]> = Lazy::new(|| Platform::ALL.map(build_table));

/// The rule table for a platform
pub fn rules_for(platform: Platform) -> &'static RuleTable {
    let index = match platform {
        Platform::Twitter => 0,
        Platform::Linkedin => 1,
        Platform::Instagram => 2,
        Platform::Facebook => 3,
    };
    &TABLES[index]
}

fn build_table(platform: Platform) -> RuleTable {
    let specific = match platform {
        Platform::Twitter => TWITTER_TEXT,
        Platform::Linkedin => LINKEDIN_TEXT,
        Platform::Instagram => INSTAGRAM_TEXT,
        Platform::Facebook => FACEBOOK_TEXT,
    };
    let mut text: Vec<Rule> = Vec::new();
    for expr in specific.iter().chain(GENERIC_TEXT) {
        if !text.iter().any(|r| r.path.as_str() == *expr) {
            text.push(Rule::text(expr));
        }
    }

    let post = format!("{}_post", platform.as_str());
    RuleTable {
        platform,
        ready_to_post_text: text,
        hashtags: vec![
            Rule::text("quick_publish.hashtags_ready"),
            Rule::text("hashtag_strategy.all_tags_string"),
            Rule::text("hashtags.all_hashtags_formatted"),
            Rule::text(&format!("{}.hashtags", post)),
            Rule::text("*_post.hashtags"),
            Rule::tags("hashtag_strategy.industry_tags"),
            Rule::tags("hashtag_strategy.content_tags"),
            Rule::tags("hashtag_strategy.brand_tags"),
            Rule::text("hashtags"),
        ],
        engagement_score: vec![
            Rule::text("quick_publish.engagement_score"),
            Rule::text("engagement_prediction.score"),
            Rule::text("engagement_prediction.estimated_score"),
            Rule::text("analytics.engagement_score"),
            Rule::text(&format!("{}.engagement_score", post)),
            Rule::text("engagement_score"),
        ],
        optimal_time: vec![
            Rule::text("quick_publish.optimal_time"),
            Rule::text("posting_strategy.optimal_time"),
            Rule::text("posting_strategy.best_time"),
            Rule::text("timing.optimal_time"),
            Rule::text(&format!("{}.optimal_time", post)),
            Rule::text("optimal_posting_time"),
            Rule::text("optimal_time"),
        ],
        visual_strategy: vec![
            Rule::text("visual_strategy"),
            Rule::text(&format!("{}.visual_strategy", post)),
            Rule::text("content_strategy.visual_strategy"),
            Rule::text("visual_suggestions"),
        ],
    }
}

/// Why a path did or did not produce a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Missing,
    Empty,
    TooShort,
    Placeholder,
    NotText,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Missing => "missing",
            Outcome::Empty => "empty",
            Outcome::TooShort => "too short",
            Outcome::Placeholder => "placeholder",
            Outcome::NotText => "not text",
        }
    }
}

/// Applies the rule tables to unwrapped payloads
#[derive(Debug, Clone)]
pub struct PlatformExtractor {
    config: WebhookConfig,
}

impl Default for PlatformExtractor {
    fn default() -> Self {
        Self::new(WebhookConfig::default())
    }
}

impl PlatformExtractor {
    /// Create an extractor with the given text acceptance settings
    pub fn new(config: WebhookConfig) -> Self {
        Self { config }
    }

    /// Build the canonical record for `platform` from `payload`.
    ///
    /// Envelopes still present are unwrapped first, so wrapped and flat forms
    /// of one payload yield the same record. Never fails: missing text
    /// becomes `ReadyText::Generating`.
    pub fn extract(&self, payload: &Value, platform: Platform) -> GeneratedContentRecord {
        let payload = unwrap_value(payload.clone()).value;
        let table = rules_for(platform);
        let mut trace = Vec::new();

        let text = self.resolve(&payload, table, Field::ReadyToPostText, &mut trace, |v| {
            self.accept_text(v)
        });
        let ready_to_post_text = match text {
            Some(text) => ReadyText::Content(text),
            None => {
                trace.push(format!("{}: -> generating", Field::ReadyToPostText.as_str()));
                ReadyText::Generating
            }
        };

        let hashtags = self
            .resolve_hashtags(&payload, table, &mut trace)
            .unwrap_or_default();
        let engagement_score =
            self.resolve(&payload, table, Field::EngagementScore, &mut trace, accept_score);
        let optimal_time =
            self.resolve(&payload, table, Field::OptimalTime, &mut trace, accept_plain_text);
        let visual_strategy =
            self.resolve(&payload, table, Field::VisualStrategy, &mut trace, accept_visual);

        debug!(
            %platform,
            generating = ready_to_post_text.is_generating(),
            hashtags = hashtags.len(),
            "extracted content record"
        );

        GeneratedContentRecord {
            platform,
            ready_to_post_text,
            hashtags,
            engagement_score,
            optimal_time,
            visual_strategy,
            extraction_trace: trace,
            raw_payload: payload,
        }
    }

    fn resolve<T>(
        &self,
        payload: &Value,
        table: &RuleTable,
        field: Field,
        trace: &mut Vec<String>,
        accept: impl Fn(&Value) -> Result<T, Outcome>,
    ) -> Option<T> {
        for rule in table.rules(field) {
            let outcome = match rule.path.resolve(payload) {
                None | Some(Value::Null) => Err(Outcome::Missing),
                Some(value) => accept(value),
            };
            match outcome {
                Ok(found) => {
                    trace.push(format!("{}: {} -> matched", field.as_str(), rule.path));
                    return Some(found);
                }
                Err(miss) => {
                    trace.push(format!("{}: {} -> {}", field.as_str(), rule.path, miss.as_str()));
                }
            }
        }
        None
    }

    fn resolve_hashtags(
        &self,
        payload: &Value,
        table: &RuleTable,
        trace: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        for rule in table.rules(Field::Hashtags) {
            let outcome = match rule.path.resolve(payload) {
                None | Some(Value::Null) => Err(Outcome::Missing),
                Some(value) => {
                    let tags = normalize_hashtags(value, rule.kind);
                    if tags.is_empty() {
                        Err(Outcome::Empty)
                    } else {
                        Ok(tags)
                    }
                }
            };
            match outcome {
                Ok(tags) => {
                    trace.push(format!("{}: {} -> matched", Field::Hashtags.as_str(), rule.path));
                    return Some(tags);
                }
                Err(miss) => trace.push(format!(
                    "{}: {} -> {}",
                    Field::Hashtags.as_str(),
                    rule.path,
                    miss.as_str()
                )),
            }
        }
        None
    }

    fn accept_text(&self, value: &Value) -> Result<String, Outcome> {
        let Value::String(text) = value else {
            return Err(Outcome::NotText);
        };
        let text = text.trim();
        if text.is_empty() {
            Err(Outcome::Empty)
        } else if text.chars().count() <= self.config.min_text_len {
            Err(Outcome::TooShort)
        } else if self.config.is_placeholder(text) {
            Err(Outcome::Placeholder)
        } else {
            Ok(text.to_string())
        }
    }
}

/// Extract with the default configuration
pub fn extract(payload: &Value, platform: Platform) -> GeneratedContentRecord {
    PlatformExtractor::default().extract(payload, platform)
}

fn accept_plain_text(value: &Value) -> Result<String, Outcome> {
    match value {
        Value::String(s) if s.trim().is_empty() => Err(Outcome::Empty),
        Value::String(s) => Ok(s.trim().to_string()),
        _ => Err(Outcome::NotText),
    }
}

fn accept_score(value: &Value) -> Result<f64, Outcome> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_score(s),
        _ => return Err(Outcome::NotText),
    };
    match score {
        Some(score) if score.is_finite() => Ok(score),
        _ => Err(Outcome::Empty),
    }
}

/// Parse "8.5", "85%", or "8/10" (numerator)
fn parse_score(text: &str) -> Option<f64> {
    let text = text.trim();
    let head = text.split('/').next().unwrap_or(text);
    let numeric: String = head
        .trim()
        .trim_end_matches('%')
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    numeric.parse().ok()
}

fn accept_visual(value: &Value) -> Result<VisualStrategy, Outcome> {
    let strategy = match value {
        Value::String(s) if s.trim().is_empty() => return Err(Outcome::Empty),
        Value::String(s) => VisualStrategy {
            description: Some(s.trim().to_string()),
            ..Default::default()
        },
        Value::Array(_) => VisualStrategy {
            suggestions: string_list(value),
            ..Default::default()
        },
        Value::Object(obj) => {
            let first_text = |keys: &[&str]| {
                keys.iter()
                    .filter_map(|k| obj.get(*k)?.as_str())
                    .map(str::trim)
                    .find(|s| !s.is_empty())
                    .map(str::to_string)
            };
            VisualStrategy {
                description: first_text(&["description", "concept", "style", "strategy"]),
                suggestions: ["suggestions", "elements", "ideas"]
                    .iter()
                    .filter_map(|k| obj.get(*k))
                    .map(string_list)
                    .find(|list| !list.is_empty())
                    .unwrap_or_default(),
                image_prompt: first_text(&["image_prompt", "imagePrompt", "prompt"]),
            }
        }
        _ => return Err(Outcome::NotText),
    };
    if strategy.is_empty() {
        Err(Outcome::Empty)
    } else {
        Ok(strategy)
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Split, filter and deduplicate hashtags from a string or list value.
///
/// Deduplication ignores case and keeps the first spelling seen.
pub fn normalize_hashtags(value: &Value, kind: RuleKind) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for chunk in string_list(value) {
        for token in chunk.split(|c: char| c.is_whitespace() || c == ',') {
            let token = token.trim_end_matches(['.', ',', ';', ':', '!', '?']);
            let Some(tag) = normalize_tag(token, kind) else {
                continue;
            };
            if !tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                tags.push(tag);
            }
        }
    }
    tags
}

fn normalize_tag(token: &str, kind: RuleKind) -> Option<String> {
    let body = match (token.strip_prefix('#'), kind) {
        (Some(body), _) => body,
        (None, RuleKind::TagList) => token,
        (None, RuleKind::Text) => return None,
    };
    if body.is_empty() || !body.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some(format!("#{}", body))
}
