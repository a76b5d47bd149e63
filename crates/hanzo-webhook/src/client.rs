//! High-level webhook client
//!
//! Runs a request through ingestion, envelope unwrapping and the
//! pipeline-specific normalizer, returning a canonical record.

use crate::aggregate::{aggregate, basic_summary};
use crate::asset::{AssetDecoder, AssetRegistry};
use crate::config::{PipelineKind, WebhookConfig};
use crate::error::Result;
use crate::extract::PlatformExtractor;
use crate::ingest::{InvokeOptions, ResponseIngestor};
use crate::record::{GeneratedAssetRecord, GeneratedContentRecord, OcrOutcome};
use crate::request::{ContentGenerationRequest, ImageGenerationRequest, OcrUploadRequest};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Webhook client for the content, OCR and image pipelines
#[derive(Debug, Clone)]
pub struct WebhookClient {
    ingestor: ResponseIngestor,
    extractor: PlatformExtractor,
    decoder: AssetDecoder,
}

impl WebhookClient {
    /// Create a client with its own asset registry
    pub fn new(config: WebhookConfig) -> Result<Self> {
        Self::with_registry(config, AssetRegistry::new())
    }

    /// Create a client whose decoded assets live in `registry`
    pub fn with_registry(config: WebhookConfig, registry: AssetRegistry) -> Result<Self> {
        Ok(Self {
            extractor: PlatformExtractor::new(config.clone()),
            ingestor: ResponseIngestor::new(config)?,
            decoder: AssetDecoder::new(registry),
        })
    }

    /// The configuration in use
    pub fn config(&self) -> &WebhookConfig {
        self.ingestor.config()
    }

    /// The registry holding decoded assets
    pub fn registry(&self) -> &AssetRegistry {
        self.decoder.registry()
    }

    /// Generate social content and normalize it for the request's platform
    pub async fn generate_content(
        &self,
        request: &ContentGenerationRequest,
        cancel: Option<CancellationToken>,
    ) -> Result<GeneratedContentRecord> {
        let url = self.config().endpoints.content_url(request.platform)?;
        let options = InvokeOptions::new(PipelineKind::ContentGeneration).with_cancel(cancel);
        let raw = self.ingestor.invoke_json(url, request, options).await?;
        let payload = raw.usable_payload()?;
        debug!(platform = %request.platform, shape = ?payload.shape, "normalizing content payload");
        Ok(self.extractor.extract(&payload.value, request.platform))
    }

    /// Upload invoices and return the enhanced summary, or the basic one
    pub async fn process_invoices(
        &self,
        request: OcrUploadRequest,
        cancel: Option<CancellationToken>,
    ) -> Result<OcrOutcome> {
        let url = self.config().endpoints.ocr_url()?.to_string();
        let form = request.into_form()?;
        let options = InvokeOptions::new(PipelineKind::OcrUpload).with_cancel(cancel);
        let raw = self.ingestor.invoke_multipart(&url, form, options).await?;
        let payload = raw.usable_payload()?;
        Ok(match aggregate(&payload.value) {
            Some(summary) => OcrOutcome::Enhanced(summary),
            None => OcrOutcome::Basic(basic_summary(&payload.value)),
        })
    }

    /// Generate an image and decode whatever form it arrives in
    pub async fn generate_image(
        &self,
        request: &ImageGenerationRequest,
        cancel: Option<CancellationToken>,
    ) -> Result<GeneratedAssetRecord> {
        let url = self.config().endpoints.image_url()?;
        let options = InvokeOptions::new(PipelineKind::ImageGeneration).with_cancel(cancel);
        let raw = self.ingestor.invoke_json(url, request, options).await?;
        let payload = raw.usable_payload()?;
        self.decoder.decode_unwrapped(&raw, &payload)
    }
}
