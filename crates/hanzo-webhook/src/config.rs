//! Webhook client configuration

use crate::error::{Result, WebhookError};
use crate::extract::Platform;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// The upstream pipelines a webhook call can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// Social content generation
    ContentGeneration,
    /// Invoice OCR batch upload
    OcrUpload,
    /// Image generation
    ImageGeneration,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::ContentGeneration => write!(f, "content generation"),
            PipelineKind::OcrUpload => write!(f, "OCR upload"),
            PipelineKind::ImageGeneration => write!(f, "image generation"),
        }
    }
}

/// Webhook URLs, one per platform or pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub ocr: Option<String>,
    pub image: Option<String>,
}

impl Endpoints {
    /// URL for a platform's content generation webhook
    pub fn content_url(&self, platform: Platform) -> Result<&str> {
        let url = match platform {
            Platform::Twitter => &self.twitter,
            Platform::Linkedin => &self.linkedin,
            Platform::Instagram => &self.instagram,
            Platform::Facebook => &self.facebook,
        };
        url.as_deref()
            .ok_or_else(|| WebhookError::Config(format!("no webhook endpoint for {}", platform)))
    }

    /// URL for the OCR upload webhook
    pub fn ocr_url(&self) -> Result<&str> {
        self.ocr
            .as_deref()
            .ok_or_else(|| WebhookError::Config("no webhook endpoint for OCR".to_string()))
    }

    /// URL for the image generation webhook
    pub fn image_url(&self) -> Result<&str> {
        self.image
            .as_deref()
            .ok_or_else(|| WebhookError::Config("no webhook endpoint for images".to_string()))
    }
}

/// Configuration for webhook calls and normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Content generation timeout in seconds
    pub content_timeout_secs: u64,

    /// OCR upload timeout in seconds
    pub ocr_timeout_secs: u64,

    /// Image generation timeout in seconds
    pub image_timeout_secs: u64,

    /// User agent for webhook requests
    pub user_agent: String,

    /// Webhook URLs
    pub endpoints: Endpoints,

    /// Extracted text must be strictly longer than this many characters
    pub min_text_len: usize,

    /// Strings upstream emits while content is still being produced
    pub placeholders: Vec<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            content_timeout_secs: 180,
            ocr_timeout_secs: 120,
            image_timeout_secs: 60,
            user_agent: format!(
                "HanzoWebhook/{} (https://hanzo.ai)",
                env!("CARGO_PKG_VERSION")
            ),
            endpoints: Endpoints::default(),
            min_text_len: 5,
            placeholders: vec![
                "Content generating".to_string(),
                "Content generating...".to_string(),
                "Generating content...".to_string(),
                "Generating...".to_string(),
                "Loading...".to_string(),
            ],
        }
    }
}

impl WebhookConfig {
    /// Parse a config from TOML text; missing keys take their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load a config file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env();
        Ok(config)
    }

    /// Override endpoints from `HANZO_WEBHOOK_<NAME>_URL` variables
    pub fn apply_env(&mut self) {
        let slots: [(&str, &mut Option<String>); 6] = [
            ("TWITTER", &mut self.endpoints.twitter),
            ("LINKEDIN", &mut self.endpoints.linkedin),
            ("INSTAGRAM", &mut self.endpoints.instagram),
            ("FACEBOOK", &mut self.endpoints.facebook),
            ("OCR", &mut self.endpoints.ocr),
            ("IMAGE", &mut self.endpoints.image),
        ];
        for (name, slot) in slots {
            if let Ok(url) = std::env::var(format!("HANZO_WEBHOOK_{}_URL", name)) {
                if !url.trim().is_empty() {
                    *slot = Some(url);
                }
            }
        }
    }

    /// Hard deadline for a pipeline
    pub fn timeout_for(&self, kind: PipelineKind) -> Duration {
        Duration::from_secs(match kind {
            PipelineKind::ContentGeneration => self.content_timeout_secs,
            PipelineKind::OcrUpload => self.ocr_timeout_secs,
            PipelineKind::ImageGeneration => self.image_timeout_secs,
        })
    }

    /// Set the webhook URLs
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Set one pipeline's timeout
    pub fn with_timeout(mut self, kind: PipelineKind, secs: u64) -> Self {
        match kind {
            PipelineKind::ContentGeneration => self.content_timeout_secs = secs,
            PipelineKind::OcrUpload => self.ocr_timeout_secs = secs,
            PipelineKind::ImageGeneration => self.image_timeout_secs = secs,
        }
        self
    }

    /// Add a placeholder string treated as "still generating"
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholders.push(placeholder.into());
        self
    }

    /// True if `text` is one of the known placeholders.
    ///
    /// Comparison ignores case, surrounding whitespace and trailing dots.
    pub fn is_placeholder(&self, text: &str) -> bool {
        let needle = normalize_placeholder(text);
        self.placeholders
            .iter()
            .any(|p| normalize_placeholder(p) == needle)
    }
}

fn normalize_placeholder(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', '…'])
        .trim()
        .to_lowercase()
}
