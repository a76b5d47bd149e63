//! Asset decoding and scoped local handles
//!
//! Decoded bytes live in an [`AssetRegistry`] and are referenced through
//! [`AssetHandle`]s rendered as `asset://<uuid>` URLs. A handle releases its
//! entry when `release` is called or when the last clone is dropped, and an
//! [`AssetSlot`] releases the previous asset whenever a new one replaces it.

use crate::envelope::{unwrap_value, Payload};
use crate::error::{AssetDecodeError, Result};
use crate::ingest::RawResponse;
use crate::path::FieldPath;
use crate::record::{AssetSourceKind, GeneratedAssetRecord};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, warn};
use uuid::Uuid;

const URL_SCHEME: &str = "asset://";

const URL_PATHS: &[&str] = &["imageUrl", "data.imageUrl", "image_url", "data.image_url"];
const DATA_PATHS: &[&str] = &["data.data", "data"];
const MIME_PATHS: &[&str] = &["mimeType", "data.mimeType", "mime_type"];
const FILE_NAME_PATHS: &[&str] = &["fileName", "data.fileName", "file_name"];

type Entries = Mutex<HashMap<Uuid, StoredAsset>>;

#[derive(Debug)]
struct StoredAsset {
    bytes: Arc<Vec<u8>>,
    mime_type: String,
}

/// Owner of decoded asset bytes
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    entries: Arc<Entries>,
}

impl AssetRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes and hand out the handle that owns them
    pub fn insert(&self, bytes: Vec<u8>, mime_type: impl Into<String>) -> AssetHandle {
        let id = Uuid::new_v4();
        let mime_type = mime_type.into();
        lock(&self.entries).insert(
            id,
            StoredAsset {
                bytes: Arc::new(bytes),
                mime_type: mime_type.clone(),
            },
        );
        AssetHandle {
            inner: Arc::new(HandleInner {
                id,
                mime_type,
                entries: Arc::downgrade(&self.entries),
            }),
        }
    }

    /// Look up bytes by `asset://` URL
    pub fn resolve(&self, url: &str) -> Option<(Arc<Vec<u8>>, String)> {
        let id = Uuid::parse_str(url.strip_prefix(URL_SCHEME)?).ok()?;
        lock(&self.entries)
            .get(&id)
            .map(|a| (a.bytes.clone(), a.mime_type.clone()))
    }

    /// Number of assets not yet released
    pub fn live_count(&self) -> usize {
        lock(&self.entries).len()
    }
}

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<Uuid, StoredAsset>> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct HandleInner {
    id: Uuid,
    mime_type: String,
    entries: Weak<Entries>,
}

impl HandleInner {
    fn release(&self) -> bool {
        match self.entries.upgrade() {
            Some(entries) => lock(&entries).remove(&self.id).is_some(),
            None => false,
        }
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.release();
    }
}

/// Reference to bytes held in an [`AssetRegistry`]
#[derive(Debug, Clone)]
pub struct AssetHandle {
    inner: Arc<HandleInner>,
}

impl AssetHandle {
    /// Registry key
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// URL the UI can hand to an image element
    pub fn url(&self) -> String {
        format!("{}{}", URL_SCHEME, self.inner.id)
    }

    /// Declared MIME type
    pub fn mime_type(&self) -> &str {
        &self.inner.mime_type
    }

    /// The bytes, unless already released
    pub fn bytes(&self) -> Option<Arc<Vec<u8>>> {
        let entries = self.inner.entries.upgrade()?;
        let guard = lock(&entries);
        guard.get(&self.inner.id).map(|a| a.bytes.clone())
    }

    /// Check if the bytes are still held
    pub fn is_live(&self) -> bool {
        self.bytes().is_some()
    }

    /// Release the bytes now, even if clones of this handle exist
    pub fn release(self) {
        if self.inner.release() {
            debug!(id = %self.inner.id, "released asset");
        }
    }
}

/// Holds the asset currently shown and releases whatever it supersedes
#[derive(Debug, Default)]
pub struct AssetSlot {
    current: Option<GeneratedAssetRecord>,
}

impl AssetSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// The asset in the slot
    pub fn current(&self) -> Option<&GeneratedAssetRecord> {
        self.current.as_ref()
    }

    /// Put `record` in the slot, releasing the previous asset
    pub fn replace(&mut self, record: GeneratedAssetRecord) {
        if let Some(mut previous) = self.current.replace(record) {
            debug!(url = ?previous.display_url(), "releasing superseded asset");
            previous.release();
        }
    }

    /// Release and empty the slot
    pub fn clear(&mut self) {
        if let Some(mut previous) = self.current.take() {
            previous.release();
        }
    }
}

impl Drop for AssetSlot {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Turns webhook responses into [`GeneratedAssetRecord`]s
#[derive(Debug, Clone, Default)]
pub struct AssetDecoder {
    registry: AssetRegistry,
}

impl AssetDecoder {
    /// Create a decoder storing bytes in `registry`
    pub fn new(registry: AssetRegistry) -> Self {
        Self { registry }
    }

    /// The registry decoded bytes are stored in
    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Decode a raw response: binary bodies directly, text bodies as payloads
    pub fn decode_response(&self, response: &RawResponse) -> Result<GeneratedAssetRecord> {
        self.decode_unwrapped(response, &response.payload())
    }

    /// Decode a response whose body was already unwrapped into `payload`
    pub fn decode_unwrapped(
        &self,
        response: &RawResponse,
        payload: &Payload,
    ) -> Result<GeneratedAssetRecord> {
        if let Some(bytes) = response.binary() {
            if bytes.is_empty() {
                warn!(status = response.status, "empty binary asset response");
                return Err(AssetDecodeError::NoAsset.into());
            }
            let mime_type = response
                .content_type
                .as_deref()
                .map(media_type)
                .unwrap_or_else(|| sniff_mime(bytes).to_string());
            let handle = self.registry.insert(bytes.to_vec(), mime_type.clone());
            return Ok(GeneratedAssetRecord::local(
                AssetSourceKind::BinaryBlob,
                mime_type,
                handle,
                response.file_name.clone(),
            ));
        }
        if payload.parse_failed {
            warn!(status = response.status, "asset response is neither binary nor JSON");
            return Err(AssetDecodeError::NoAsset.into());
        }
        self.decode_payload(&payload.value)
    }

    /// Decode a parsed payload, trying URL, data URI, byte array, then metadata
    pub fn decode_payload(&self, payload: &Value) -> Result<GeneratedAssetRecord> {
        let payload = unwrap_value(payload.clone()).value;
        let declared_mime = first_str(&payload, MIME_PATHS);
        let file_name = first_str(&payload, FILE_NAME_PATHS);

        if let Some(url) = first_str(&payload, URL_PATHS) {
            if url::Url::parse(&url).is_ok() {
                let mime = declared_mime.unwrap_or_else(|| mime_from_name(&url).to_string());
                let mut record = GeneratedAssetRecord::remote(url, mime);
                record.original_file_name = file_name;
                return Ok(record);
            }
            warn!(url = %url, "ignoring unparseable image URL");
        }

        for expr in DATA_PATHS {
            let Some(data) = FieldPath::parse(expr).resolve(&payload) else {
                continue;
            };
            if let Some(record) = self.decode_data(data, declared_mime.as_deref(), &file_name)? {
                return Ok(record);
            }
        }

        if let (Some(mime), Some(name)) = (&declared_mime, &file_name) {
            let diagnostic = format!(
                "workflow declared file {} ({}) but attached no data",
                name, mime
            );
            warn!(file_name = %name, mime_type = %mime, "metadata-only asset response");
            let record = GeneratedAssetRecord::metadata_only(mime.clone(), Some(name.clone()), diagnostic);
            return Err(AssetDecodeError::MetadataOnly(Box::new(record)).into());
        }

        Err(AssetDecodeError::NoAsset.into())
    }

    fn decode_data(
        &self,
        data: &Value,
        declared_mime: Option<&str>,
        file_name: &Option<String>,
    ) -> Result<Option<GeneratedAssetRecord>> {
        let (kind, bytes, uri_mime) = match data {
            Value::String(s) if s.contains("base64,") => {
                let (bytes, uri_mime) = decode_data_uri(s)?;
                (AssetSourceKind::DataUri, bytes, uri_mime)
            }
            Value::String(s) if s.trim_start().starts_with("data:") => {
                return Err(AssetDecodeError::MalformedDataUri(preview(s)).into());
            }
            // Raw base64 next to a declared mime type, as binary-data nodes emit it
            Value::String(s) if declared_mime.is_some() && !s.trim().is_empty() => {
                (AssetSourceKind::BinaryBlob, decode_base64(s)?, None)
            }
            Value::Array(items) => (AssetSourceKind::BinaryBlob, byte_array(items)?, None),
            Value::Object(obj) if is_buffer(obj) => match obj.get("data") {
                Some(Value::Array(items)) => (AssetSourceKind::BinaryBlob, byte_array(items)?, None),
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };
        if bytes.is_empty() {
            debug!(?kind, "asset data decoded to zero bytes");
            return Ok(None);
        }
        let mime_type = declared_mime
            .map(str::to_string)
            .or(uri_mime)
            .unwrap_or_else(|| sniff_mime(&bytes).to_string());
        debug!(?kind, bytes = bytes.len(), mime = %mime_type, "decoded asset payload");
        let handle = self.registry.insert(bytes, mime_type.clone());
        Ok(Some(GeneratedAssetRecord::local(
            kind,
            mime_type,
            handle,
            file_name.clone(),
        )))
    }
}

/// Split a `data:<mime>;base64,<payload>` string and decode the payload
pub fn decode_data_uri(uri: &str) -> std::result::Result<(Vec<u8>, Option<String>), AssetDecodeError> {
    let Some((header, encoded)) = uri.split_once(',') else {
        return Err(AssetDecodeError::MalformedDataUri(preview(uri)));
    };
    let mime = header
        .trim()
        .strip_prefix("data:")
        .and_then(|h| h.split(';').next())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    Ok((decode_base64(encoded)?, mime))
}

fn decode_base64(encoded: &str) -> std::result::Result<Vec<u8>, AssetDecodeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| AssetDecodeError::InvalidBase64(e.to_string()))
}

fn byte_array(items: &[Value]) -> std::result::Result<Vec<u8>, AssetDecodeError> {
    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| AssetDecodeError::InvalidByteArray(format!("element {} is {}", i, v)))
        })
        .collect()
}

fn is_buffer(obj: &Map<String, Value>) -> bool {
    obj.get("type").and_then(Value::as_str) == Some("Buffer")
}

fn first_str(payload: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .filter_map(|expr| FieldPath::parse(expr).resolve(payload)?.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}

fn preview(s: &str) -> String {
    s.chars().take(48).collect()
}

/// Guess a MIME type from magic bytes
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}

fn mime_from_name(name: &str) -> &'static str {
    let path = name.split(['?', '#']).next().unwrap_or(name);
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
