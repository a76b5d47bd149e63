//! # Hanzo Webhook
//!
//! Normalization layer for workflow-automation webhook responses.
//!
//! Automation services (social content generators, invoice OCR, image
//! generation) answer with loosely typed, drifting payloads. This crate turns
//! those responses into strongly typed records without dropping usable data
//! and without failing on malformed input.
//!
//! ## Features
//!
//! - **Ingestion**: POST with a per-pipeline deadline and optional cancellation
//! - **Envelopes**: markdown fences, `[{json: ...}]` and `{json: ...}` wrappers
//! - **Field extraction**: ordered fallback paths per platform and field, with
//!   an extraction trace recording every path tried
//! - **Assets**: remote URLs, data URIs, byte arrays and binary bodies, held
//!   through explicitly released handles
//! - **OCR aggregation**: legacy and flattened enhanced payloads
//!
//! ## Example
//!
//! ```rust
//! use hanzo_webhook::{extract, Platform, ReadyText};
//! use serde_json::json;
//!
//! let payload = json!([{"json": {
//!     "quick_publish": {"single_tweet_ready": "Hello #ai"},
//!     "hashtag_strategy": {"all_tags_string": "#ai #ml"}
//! }}]);
//! let record = extract(&payload, Platform::Twitter);
//! assert_eq!(record.ready_to_post_text, ReadyText::Content("Hello #ai".into()));
//! assert_eq!(record.hashtags, vec!["#ai", "#ml"]);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌────────────────────┐
//! │   Ingestor   │ ──► │  Envelope    │ ──► │ Platform extractor │
//! │ (HTTP, time- │     │  unwrapper   │     │ / OCR aggregator   │
//! │  out, cancel)│     └──────────────┘     └────────────────────┘
//! └──────────────┘            │                       │
//!        │                    ▼                       ▼
//!        │            ┌──────────────┐       ┌─────────────────┐
//!        └──────────► │ Asset decoder│       │ Canonical record│
//!                     └──────────────┘       └─────────────────┘
//! ```

pub mod aggregate;
pub mod asset;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod generation;
pub mod ingest;
pub mod path;
pub mod record;
pub mod request;

pub use aggregate::{aggregate, basic_summary, parse_currency};
pub use asset::{AssetDecoder, AssetHandle, AssetRegistry, AssetSlot};
pub use client::WebhookClient;
pub use config::{Endpoints, PipelineKind, WebhookConfig};
pub use envelope::{strip_code_fence, unwrap_text, unwrap_value, EnvelopeShape, Payload};
pub use error::{AssetDecodeError, Result, WebhookError};
pub use extract::{extract, Platform, PlatformExtractor};
pub use generation::{GenerationToken, GenerationTracker, LatestResult};
pub use ingest::{InvokeOptions, RawResponse, ResponseBody, ResponseIngestor};
pub use record::*;
pub use request::{ContentGenerationRequest, ImageGenerationRequest, OcrUploadRequest, UploadFile};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::client::WebhookClient;
    pub use crate::config::WebhookConfig;
    pub use crate::error::{Result, WebhookError};
    pub use crate::extract::Platform;
    pub use crate::record::*;
}
