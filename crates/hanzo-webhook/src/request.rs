//! Webhook request bodies

use crate::error::Result;
use crate::extract::Platform;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON body for the content generation webhooks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentGenerationRequest {
    pub platform: Platform,
    pub input_content: String,
    pub content_type: String,
    pub tone: String,
    pub writing_technique: String,
    pub success_factor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

impl ContentGenerationRequest {
    /// Create a request with empty style settings
    pub fn new(platform: Platform, input_content: impl Into<String>) -> Self {
        Self {
            platform,
            input_content: input_content.into(),
            content_type: "post".to_string(),
            tone: "professional".to_string(),
            writing_technique: String::new(),
            success_factor: String::new(),
            target_audience: None,
            keywords: None,
        }
    }

    /// Set the tone
    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }

    /// Set the target audience
    pub fn with_target_audience(mut self, audience: impl Into<String>) -> Self {
        self.target_audience = Some(audience.into());
        self
    }

    /// Set the keywords
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = Some(keywords);
        self
    }
}

/// One file in a multipart upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Multipart field carrying each uploaded file
pub const FILES_FIELD: &str = "files[]";

/// Multipart body for the OCR upload webhook
#[derive(Debug, Clone, PartialEq)]
pub struct OcrUploadRequest {
    pub files: Vec<UploadFile>,
    pub workflow_id: String,
    pub batch_name: Option<String>,
    /// Sent as a JSON string field
    pub metadata: Value,
}

impl OcrUploadRequest {
    pub fn new(workflow_id: impl Into<String>, files: Vec<UploadFile>) -> Self {
        Self {
            files,
            workflow_id: workflow_id.into(),
            batch_name: None,
            metadata: Value::Object(Default::default()),
        }
    }

    /// Set the batch name
    pub fn with_batch_name(mut self, name: impl Into<String>) -> Self {
        self.batch_name = Some(name.into());
        self
    }

    /// Set the metadata object
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Build the multipart form; every file goes under `files[]`
    pub fn into_form(self) -> Result<Form> {
        let mut form = Form::new()
            .text("workflowId", self.workflow_id)
            .text("metadata", serde_json::to_string(&self.metadata)?);
        if let Some(batch_name) = self.batch_name {
            form = form.text("batchName", batch_name);
        }
        for file in self.files {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.mime_type)?;
            form = form.part(FILES_FIELD, part);
        }
        Ok(form)
    }
}

/// JSON body for the image generation webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageGenerationRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl ImageGenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            style: None,
            size: None,
            platform: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_request_wire_format() {
        let request = ContentGenerationRequest::new(Platform::Linkedin, "Q3 results")
            .with_tone("confident")
            .with_keywords(vec!["growth".into()]);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "platform": "linkedin",
                "inputContent": "Q3 results",
                "contentType": "post",
                "tone": "confident",
                "writingTechnique": "",
                "successFactor": "",
                "keywords": ["growth"]
            })
        );
    }

    #[test]
    fn test_ocr_form_builds() {
        let request = OcrUploadRequest::new(
            "wf-1",
            vec![UploadFile::new("a.pdf", "application/pdf", b"%PDF-1.4".to_vec())],
        )
        .with_batch_name("October")
        .with_metadata(json!({"source": "desktop"}));
        assert!(request.into_form().is_ok());
    }

    #[test]
    fn test_ocr_form_rejects_bad_mime() {
        let request = OcrUploadRequest::new(
            "wf-1",
            vec![UploadFile::new("a.pdf", "not a mime", vec![1])],
        );
        assert!(request.into_form().is_err());
    }
}
