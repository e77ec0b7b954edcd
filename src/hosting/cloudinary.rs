//! Cloudinary-compatible unsigned upload client.

use super::{FileHost, UploadRequest, UploadedFile};
use crate::{
    config::HostingConfig,
    errors::{Error, Result},
};
use async_trait::async_trait;
use reqwest::{Client, multipart};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, instrument};

/// Response body of the upload endpoint.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
}

/// Uploads files with multipart/form-data POSTs to
/// `{base_url}/v1_1/{cloud_name}/{resource_type}/upload`.
#[derive(Debug, Clone)]
pub struct CloudinaryClient {
    client: Client,
    base_url: String,
    cloud_name: String,
    upload_preset: String,
}

impl CloudinaryClient {
    /// Builds a client from the hosting configuration. Credentials must be present.
    pub fn new(config: &HostingConfig) -> Result<Self> {
        let (cloud_name, upload_preset) = config.credentials()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config {
                message: format!("Failed to initialise HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cloud_name: cloud_name.to_string(),
            upload_preset: upload_preset.to_string(),
        })
    }

    fn endpoint(&self, request: &UploadRequest) -> String {
        format!(
            "{}/v1_1/{}/{}/upload",
            self.base_url,
            self.cloud_name,
            request.resource_type.as_str()
        )
    }
}

#[async_trait]
impl FileHost for CloudinaryClient {
    #[instrument(skip(self, request), fields(file = %request.file_name, size = request.bytes.len()))]
    async fn upload(&self, request: UploadRequest) -> Result<UploadedFile> {
        let url = self.endpoint(&request);

        let part = multipart::Part::bytes(request.bytes)
            .file_name(request.file_name.clone())
            .mime_str(&request.content_type)?;
        let mut form = multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());
        if let Some(target_name) = request.target_name {
            form = form.text("public_id", target_name);
        }
        if let Some(folder) = request.folder {
            form = form.text("folder", folder);
        }

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        let parsed: Option<UploadResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(UploadResponse {
                secure_url: Some(secure_url),
                ..
            }) if status.is_success() => {
                info!("Uploaded {} to {secure_url}", request.file_name);
                Ok(UploadedFile { url: secure_url })
            }
            Some(UploadResponse {
                error: Some(provider_error),
                ..
            }) => {
                error!("Upload of {} rejected: {}", request.file_name, provider_error.message);
                Err(Error::Upload {
                    message: provider_error.message,
                })
            }
            _ => {
                error!("Upload of {} failed with status {status}", request.file_name);
                Err(Error::Upload {
                    message: format!("hosting API answered {status} without a file URL"),
                })
            }
        }
    }
}
