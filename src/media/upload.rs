use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use super::blob::Blob;

/// Accepts a blob and returns a durable URL for it
#[async_trait::async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, blob: &Blob) -> Result<String>;
}

/// Uploader that stores blobs as files under a storage directory
pub struct DirectoryUploader {
    storage_dir: PathBuf,
    public_base_url: String,
}

impl DirectoryUploader {
    pub fn new(storage_dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn storage_dir(&self) -> &PathBuf {
        &self.storage_dir
    }
}

#[async_trait::async_trait]
impl Uploader for DirectoryUploader {
    async fn upload(&self, blob: &Blob) -> Result<String> {
        tokio::fs::create_dir_all(&self.storage_dir)
            .await
            .with_context(|| format!("Failed to create storage directory: {:?}", self.storage_dir))?;

        let file_name = format!("{}-{}", uuid::Uuid::new_v4(), sanitize_file_name(blob.name()));
        let path = self.storage_dir.join(&file_name);

        tokio::fs::write(&path, blob.bytes())
            .await
            .with_context(|| format!("Failed to write upload: {:?}", path))?;

        info!(
            "Uploaded {} ({} bytes, {}) to {}",
            blob.name(),
            blob.size(),
            blob.mime_type(),
            path.display()
        );

        Ok(format!("{}/{}", self.public_base_url, file_name))
    }
}

/// Keep only characters that are safe in a file name and a URL path segment
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
