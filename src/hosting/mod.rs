//! File hosting API and remote document fetching.
//!
//! Receipts, request summaries and compiled report archives are pushed to a hosted
//! media service; receipt and request PDFs are pulled back when a report is compiled.

mod cloudinary;
mod fetch;

pub use cloudinary::CloudinaryClient;
pub use fetch::HttpFetcher;

use crate::errors::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Resource type segment of the upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    /// Let the provider detect the type
    Auto,
    /// Rendered images
    Image,
    /// Opaque binaries (PDF receipts, spreadsheets, zip archives)
    Raw,
}

impl ResourceType {
    /// Path segment used by the upload endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Image => "image",
            Self::Raw => "raw",
        }
    }
}

/// A validated, non-empty file ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// File contents
    pub bytes: Vec<u8>,
    /// Name sent with the multipart part
    pub file_name: String,
    /// MIME type of the part
    pub content_type: String,
    /// Target name on the host (public id); `None` lets the host pick one
    pub target_name: Option<String>,
    /// Folder on the host
    pub folder: Option<String>,
    /// Endpoint resource type
    pub resource_type: ResourceType,
}

impl UploadRequest {
    /// Builds an upload from an in-memory buffer. Empty buffers are rejected.
    pub fn from_bytes(
        bytes: Vec<u8>,
        file_name: impl Into<String>,
        resource_type: ResourceType,
    ) -> Result<Self> {
        let file_name = file_name.into();
        if bytes.is_empty() {
            return Err(Error::Upload {
                message: format!("{file_name} is empty (0 bytes)"),
            });
        }
        let content_type = content_type_for(&file_name).to_string();
        Ok(Self {
            bytes,
            file_name,
            content_type,
            target_name: None,
            folder: None,
            resource_type,
        })
    }

    /// Reads a local file. Missing, unreadable and zero-byte files are rejected
    /// before anything is sent.
    pub async fn from_path(path: &Path, resource_type: ResourceType) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| Error::Upload {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(bytes, file_name, resource_type)
    }

    /// Sets the target name on the host.
    #[must_use]
    pub fn with_target_name(mut self, target_name: impl Into<String>) -> Self {
        self.target_name = Some(target_name.into());
        self
    }

    /// Sets the destination folder on the host.
    #[must_use]
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }
}

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Public HTTPS URL of the stored file
    pub url: String,
}

/// Third-party media storage.
#[async_trait]
pub trait FileHost: Send + Sync {
    /// Stores the file and returns its public URL.
    async fn upload(&self, request: UploadRequest) -> Result<UploadedFile>;
}

/// Retrieves hosted documents by URL.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Downloads the document body.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

fn content_type_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}
