use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// In-memory binary payload with a MIME type and a file name
///
/// Bytes are shared, so cloning a blob never copies the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    name: String,
    mime_type: String,
    data: Arc<[u8]>,
}

impl Blob {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Byte length of the payload
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_audio(&self) -> bool {
        has_top_level_type(&self.mime_type, "audio")
    }

    pub fn is_image(&self) -> bool {
        has_top_level_type(&self.mime_type, "image")
    }

    pub fn info(&self) -> BlobInfo {
        BlobInfo {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.size(),
            size_mb: format!("{:.2}", self.size() as f64 / (1024.0 * 1024.0)),
        }
    }
}

/// Metadata the submission form may read about a blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobInfo {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: usize,
    /// Size in megabytes with two decimals, as shown next to the recording
    pub size_mb: String,
}

/// Guess a MIME type from a file extension
pub fn mime_from_extension(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "m4a" => "audio/mp4",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn has_top_level_type(mime_type: &str, top: &str) -> bool {
    mime_type
        .trim()
        .split_once('/')
        .map(|(kind, _)| kind.eq_ignore_ascii_case(top))
        .unwrap_or(false)
}
