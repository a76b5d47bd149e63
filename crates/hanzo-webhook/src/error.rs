//! Error types for webhook normalization

use crate::config::PipelineKind;
use crate::record::GeneratedAssetRecord;
use thiserror::Error;

/// Result type for webhook operations
pub type Result<T> = std::result::Result<T, WebhookError>;

/// Errors surfaced to the caller.
///
/// Format-level problems (invalid JSON, missing fields) never appear here:
/// they degrade into a valid record instead. Only conditions with no usable
/// result left propagate as `Err`.
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Unreachable host, DNS failure, connection reset
    #[error("Network error: {0}")]
    Network(String),

    /// The pipeline deadline expired before a response arrived
    #[error("Webhook timeout after {secs} seconds ({pipeline})")]
    Timeout { pipeline: PipelineKind, secs: u64 },

    /// The caller cancelled the request
    #[error("Webhook request cancelled")]
    Cancelled,

    /// Non-2xx status whose body carried no recognizable payload
    #[error("HTTP error {status}: {body_preview}")]
    HttpStatus { status: u16, body_preview: String },

    /// No usable asset could be produced
    #[error("Asset decode error: {0}")]
    AssetDecode(#[from] AssetDecodeError),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Missing endpoint, unreadable config file, client build failure
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebhookError {
    /// True for the network class: transport failures, timeouts, cancellation
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            WebhookError::Network(_) | WebhookError::Timeout { .. } | WebhookError::Cancelled
        )
    }

    /// True when the pipeline deadline expired
    pub fn is_timeout(&self) -> bool {
        matches!(self, WebhookError::Timeout { .. })
    }
}

/// Reasons an asset could not be decoded
#[derive(Error, Debug)]
pub enum AssetDecodeError {
    /// Base64 payload with bad padding or characters outside the alphabet
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),

    /// `data.data` string without a `base64,` marker
    #[error("malformed data URI: {0}")]
    MalformedDataUri(String),

    /// Byte array containing values outside 0..=255
    #[error("invalid byte array: {0}")]
    InvalidByteArray(String),

    /// The workflow declared a file but attached no bytes
    #[error("{}", .0.diagnostic.as_deref().unwrap_or("metadata-only response"))]
    MetadataOnly(Box<GeneratedAssetRecord>),

    /// Nothing in the response resembles an asset
    #[error("no asset found in response")]
    NoAsset,
}

impl From<reqwest::Error> for WebhookError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            WebhookError::HttpStatus {
                status: status.as_u16(),
                body_preview: err.to_string(),
            }
        } else if err.is_builder() {
            WebhookError::Config(err.to_string())
        } else {
            WebhookError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for WebhookError {
    fn from(err: url::ParseError) -> Self {
        WebhookError::InvalidUrl(err.to_string())
    }
}

impl From<toml::de::Error> for WebhookError {
    fn from(err: toml::de::Error) -> Self {
        WebhookError::Config(err.to_string())
    }
}
