//! Webhook invocation and response classification

use crate::config::{PipelineKind, WebhookConfig};
use crate::envelope::{unwrap_text, Payload};
use crate::error::{Result, WebhookError};
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Body of a webhook response, classified by content type
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Anything not declared as an image; JSON validity is checked later
    Text(String),
    /// `image/*` body
    Binary(Vec<u8>),
}

/// A webhook response before any normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// File name from `content-disposition`, if any
    pub file_name: Option<String>,
    pub body: ResponseBody,
}

impl RawResponse {
    /// Build a text response
    pub fn text_body(status: u16, content_type: &str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some(content_type.to_string()),
            file_name: None,
            body: ResponseBody::Text(body.into()),
        }
    }

    /// Build a binary response
    pub fn binary_body(status: u16, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            status,
            content_type: Some(content_type.to_string()),
            file_name: None,
            body: ResponseBody::Binary(bytes),
        }
    }

    /// Check for a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Text body, if the response was classified as text
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Text(text) => Some(text),
            ResponseBody::Binary(_) => None,
        }
    }

    /// Binary body, if the response was classified as an image
    pub fn binary(&self) -> Option<&[u8]> {
        match &self.body {
            ResponseBody::Binary(bytes) => Some(bytes),
            ResponseBody::Text(_) => None,
        }
    }

    /// Unwrap the body into a payload object
    pub fn payload(&self) -> Payload {
        match &self.body {
            ResponseBody::Text(text) => unwrap_text(text),
            ResponseBody::Binary(bytes) => Payload::binary(bytes.len()),
        }
    }

    /// The payload, unless the status is non-2xx and nothing usable came back.
    ///
    /// A non-2xx response that still carries a payload is accepted: upstream
    /// automation services send usable bodies with error statuses.
    pub fn usable_payload(&self) -> Result<Payload> {
        let payload = self.payload();
        if self.is_success() {
            return Ok(payload);
        }
        if payload.is_usable() {
            warn!(status = self.status, shape = ?payload.shape, "using payload from non-2xx webhook response");
            return Ok(payload);
        }
        Err(WebhookError::HttpStatus {
            status: self.status,
            body_preview: self.body_preview(),
        })
    }

    /// First characters of the body, for diagnostics
    pub fn body_preview(&self) -> String {
        match &self.body {
            ResponseBody::Text(text) => text.chars().take(200).collect(),
            ResponseBody::Binary(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

/// Per-call settings
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    pub pipeline: PipelineKind,
    /// Overrides the pipeline's configured timeout
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl InvokeOptions {
    /// Options for a pipeline with its configured timeout
    pub fn new(pipeline: PipelineKind) -> Self {
        Self {
            pipeline,
            timeout: None,
            cancel: None,
        }
    }

    /// Use a specific timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abort when `token` is cancelled
    pub fn with_cancel(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }
}

/// Issues webhook calls with a hard deadline
#[derive(Debug, Clone)]
pub struct ResponseIngestor {
    config: WebhookConfig,
    client: Client,
}

impl ResponseIngestor {
    /// Create an ingestor with the given configuration
    pub fn new(config: WebhookConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| WebhookError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// The configuration in use
    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// POST a JSON body
    pub async fn invoke_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        options: InvokeOptions,
    ) -> Result<RawResponse> {
        let url = url::Url::parse(url)?;
        let request = self.client.post(url.clone()).json(body);
        self.send(url.as_str(), request, options).await
    }

    /// POST a multipart form
    pub async fn invoke_multipart(
        &self,
        url: &str,
        form: Form,
        options: InvokeOptions,
    ) -> Result<RawResponse> {
        let url = url::Url::parse(url)?;
        let request = self.client.post(url.clone()).multipart(form);
        self.send(url.as_str(), request, options).await
    }

    async fn send(
        &self,
        url: &str,
        request: RequestBuilder,
        options: InvokeOptions,
    ) -> Result<RawResponse> {
        let pipeline = options.pipeline;
        let timeout = options
            .timeout
            .unwrap_or_else(|| self.config.timeout_for(pipeline));
        let secs = timeout.as_secs();
        let cancel = options.cancel.unwrap_or_default();
        let start = Instant::now();

        let call = async {
            let response = request
                .send()
                .await
                .map_err(|e| classify(e, pipeline, secs))?;
            read_response(response)
                .await
                .map_err(|e| classify(e, pipeline, secs))
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WebhookError::Cancelled),
            outcome = tokio::time::timeout(timeout, call) => match outcome {
                Ok(result) => result,
                Err(_) => Err(WebhookError::Timeout { pipeline, secs }),
            },
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(raw) => info!(
                url,
                %pipeline,
                status = raw.status,
                binary = raw.binary().is_some(),
                elapsed_ms,
                "webhook responded"
            ),
            Err(err) => warn!(url, %pipeline, elapsed_ms, error = %err, "webhook call failed"),
        }
        result
    }
}

async fn read_response(response: Response) -> std::result::Result<RawResponse, reqwest::Error> {
    let status = response.status().as_u16();
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let content_type = header("content-type");
    let file_name = header("content-disposition").and_then(|d| disposition_file_name(&d));

    let is_image = content_type
        .as_deref()
        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"));
    let body = if is_image {
        ResponseBody::Binary(response.bytes().await?.to_vec())
    } else {
        ResponseBody::Text(response.text().await?)
    };
    Ok(RawResponse {
        status,
        content_type,
        file_name,
        body,
    })
}

fn classify(err: reqwest::Error, pipeline: PipelineKind, secs: u64) -> WebhookError {
    if err.is_timeout() {
        WebhookError::Timeout { pipeline, secs }
    } else {
        WebhookError::from(err)
    }
}

fn disposition_file_name(disposition: &str) -> Option<String> {
    disposition.split(';').find_map(|part| {
        let value = part.trim().strip_prefix("filename=")?;
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeShape;
    use mockito::Server;
    use serde_json::json;

    fn ingestor() -> ResponseIngestor {
        ResponseIngestor::new(WebhookConfig::default()).unwrap()
    }

    #[test]
    fn test_usable_payload_policy() {
        let ok_empty = RawResponse::text_body(200, "application/json", "");
        assert!(ok_empty.usable_payload().is_ok());

        let recovered = RawResponse::text_body(500, "application/json", r#"[{"json": {"content": "Still here, still useful"}}]"#);
        let payload = recovered.usable_payload().unwrap();
        assert_eq!(payload.shape, EnvelopeShape::ArrayWrapped);

        let failed = RawResponse::text_body(502, "text/html", "   ");
        match failed.usable_payload() {
            Err(WebhookError::HttpStatus { status, .. }) => assert_eq!(status, 502),
            other => panic!("expected HttpStatus, got {:?}", other),
        }
        let empty_object = RawResponse::text_body(404, "application/json", "{}");
        assert!(empty_object.usable_payload().is_err());
    }

    #[test]
    fn test_error_page_is_not_a_payload() {
        let page = RawResponse::text_body(
            502,
            "text/html",
            "<html><body><h1>502 Bad Gateway</h1></body></html>",
        );
        match page.usable_payload() {
            Err(WebhookError::HttpStatus { status, body_preview }) => {
                assert_eq!(status, 502);
                assert!(body_preview.contains("Bad Gateway"));
            }
            other => panic!("expected HttpStatus, got {:?}", other),
        }

        let plain_ok = RawResponse::text_body(200, "text/plain", "Here is your post");
        assert!(plain_ok.usable_payload().unwrap().parse_failed);
    }

    #[test]
    fn test_empty_image_body_on_error_status() {
        let empty = RawResponse::binary_body(500, "image/png", Vec::new());
        assert!(matches!(
            empty.usable_payload(),
            Err(WebhookError::HttpStatus { status: 500, .. })
        ));
        let image = RawResponse::binary_body(500, "image/png", vec![0x89, b'P', b'N', b'G']);
        assert!(image.usable_payload().is_ok());
    }

    #[test]
    fn test_disposition_file_name() {
        assert_eq!(
            disposition_file_name("attachment; filename=\"render.png\""),
            Some("render.png".to_string())
        );
        assert_eq!(disposition_file_name("inline"), None);
    }

    #[tokio::test]
    async fn test_text_response_with_error_status_is_returned() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/webhook/twitter")
            .match_header("content-type", "application/json")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"quick_publish": {"single_tweet_ready": "Shipping today #rust"}}"#)
            .create_async()
            .await;

        let url = format!("{}/webhook/twitter", server.url());
        let raw = ingestor()
            .invoke_json(&url, &json!({"platform": "twitter"}), InvokeOptions::new(PipelineKind::ContentGeneration))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(raw.status, 500);
        assert!(raw.text().unwrap().contains("single_tweet_ready"));
    }

    #[tokio::test]
    async fn test_image_response_is_binary() {
        let mut server = Server::new_async().await;
        let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        server
            .mock("POST", "/image")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_header("content-disposition", "attachment; filename=\"out.png\"")
            .with_body(png.clone())
            .create_async()
            .await;

        let raw = ingestor()
            .invoke_json(
                &format!("{}/image", server.url()),
                &json!({"prompt": "a cat"}),
                InvokeOptions::new(PipelineKind::ImageGeneration),
            )
            .await
            .unwrap();
        assert_eq!(raw.binary(), Some(png.as_slice()));
        assert_eq!(raw.file_name.as_deref(), Some("out.png"));
        assert_eq!(raw.payload().shape, EnvelopeShape::BinaryBlob);
    }

    #[tokio::test]
    async fn test_cancelled_before_response() {
        let token = CancellationToken::new();
        token.cancel();
        let err = ingestor()
            .invoke_json(
                "http://127.0.0.1:9/never",
                &json!({}),
                InvokeOptions::new(PipelineKind::OcrUpload).with_cancel(Some(token)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Cancelled));
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let err = ingestor()
            .invoke_json(
                &format!("http://{}/slow", addr),
                &json!({}),
                InvokeOptions::new(PipelineKind::ImageGeneration)
                    .with_timeout(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = ingestor()
            .invoke_json("not a url", &json!({}), InvokeOptions::new(PipelineKind::ContentGeneration))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::InvalidUrl(_)));
    }
}
