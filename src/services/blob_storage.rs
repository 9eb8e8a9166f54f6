use crate::config::{PipelineConfig, StorageCredentials};
use crate::error::StorageError;
use crate::services::metadata::MetadataService;
use crate::utils::naming::{generate_object_name, sanitize_object_name};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, multipart};
use serde::Deserialize;
use std::path::Path;

/// Path of the backend endpoint that issues short-lived write URLs
pub const UPLOAD_URL_PATH: &str = "/getUploadUrl";
/// Path of the backend endpoint that stores a file on the caller's behalf
pub const PROXY_UPLOAD_PATH: &str = "/api/upload";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Durable URL of the blob (never carries a SAS token)
    pub url: String,
    /// Object name actually used
    pub name: String,
    pub content_type: String,
}

#[async_trait]
pub trait BlobUploader: Send + Sync {
    /// Uploads a local file and returns where it landed
    async fn upload(&self, path: &Path, name: Option<&str>) -> Result<StoredBlob, StorageError>;
}

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    #[serde(alias = "uploadUrl")]
    upload_url: String,
    #[serde(alias = "blobUrl")]
    blob_url: String,
}

#[derive(Debug, Deserialize)]
struct ProxyUploadResponse {
    url: String,
}

/// Azure block-blob uploader with three routes: static SAS credentials, a
/// backend-issued write URL, and a backend proxy upload.
pub struct AzureBlobUploader {
    http: Client,
    credentials: Option<StorageCredentials>,
    api_base: Option<String>,
    probe_before_upload: bool,
}

impl AzureBlobUploader {
    pub fn new(
        http: Client,
        credentials: Option<StorageCredentials>,
        api_base: Option<String>,
        probe_before_upload: bool,
    ) -> Self {
        Self {
            http,
            credentials,
            api_base: api_base.map(|b| b.trim_end_matches('/').to_string()),
            probe_before_upload,
        }
    }

    pub fn from_config(config: &PipelineConfig, http: Client) -> Self {
        Self::new(
            http,
            config.storage.clone(),
            config.api_base().map(str::to_string),
            config.probe_before_upload,
        )
    }

    async fn request_upload_url(
        &self,
        api_base: &str,
        name: &str,
    ) -> Result<UploadUrlResponse, StorageError> {
        let endpoint = format!("{}{}", api_base, UPLOAD_URL_PATH);
        let response = self
            .http
            .post(&endpoint)
            .query(&[("file_name", name)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::BadResponse {
                endpoint,
                reason: format!("status {}: {}", status, body),
            });
        }

        response
            .json::<UploadUrlResponse>()
            .await
            .map_err(|e| StorageError::BadResponse {
                endpoint,
                reason: e.to_string(),
            })
    }

    /// HEAD the write URL so a rejected token fails before the body is sent.
    /// A missing blob (404) is the expected answer.
    async fn probe(&self, upload_url: &str) -> Result<(), StorageError> {
        let response = self.http.head(upload_url).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Unauthorized { status, body });
        }

        tracing::debug!("Storage probe answered {}", status);
        Ok(())
    }

    async fn put_blob(
        &self,
        upload_url: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .http
            .put(upload_url)
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("❌ Blob transfer rejected with {}: {}", status, body);
            return Err(StorageError::TransferFailed { status, body });
        }
        Ok(())
    }

    async fn proxy_upload(
        &self,
        api_base: &str,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let endpoint = format!("{}{}", api_base, PROXY_UPLOAD_PATH);
        let part = multipart::Part::bytes(data.to_vec())
            .file_name(name.to_string())
            .mime_str(content_type)?;
        let form = multipart::Form::new().part("file", part);

        let response = self.http.post(&endpoint).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::BadResponse {
                endpoint,
                reason: format!("status {}: {}", status, body),
            });
        }

        let parsed: ProxyUploadResponse =
            response
                .json()
                .await
                .map_err(|e| StorageError::BadResponse {
                    endpoint,
                    reason: e.to_string(),
                })?;
        Ok(parsed.url)
    }

    async fn upload_via_backend(
        &self,
        api_base: &str,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        match self.request_upload_url(api_base, name).await {
            Ok(target) => {
                if self.probe_before_upload {
                    self.probe(&target.upload_url).await?;
                }
                self.put_blob(&target.upload_url, data, content_type).await?;
                Ok(target.blob_url)
            }
            Err(token_error) => {
                tracing::warn!(
                    "⚠️  Token endpoint unavailable ({}), falling back to proxy upload",
                    token_error
                );
                self.proxy_upload(api_base, name, data, content_type)
                    .await
                    .map_err(|proxy_error| StorageError::Unavailable {
                        token_error: token_error.to_string(),
                        proxy_error: proxy_error.to_string(),
                    })
            }
        }
    }
}

#[async_trait]
impl BlobUploader for AzureBlobUploader {
    async fn upload(&self, path: &Path, name: Option<&str>) -> Result<StoredBlob, StorageError> {
        if self.credentials.is_none() && self.api_base.is_none() {
            return Err(StorageError::MissingConfiguration);
        }

        let data = tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|source| StorageError::Read {
                path: path.display().to_string(),
                source,
            })?;

        let name = match name {
            Some(explicit) => sanitize_object_name(explicit),
            None => generate_object_name(path),
        };
        let content_type = MetadataService::detect_mime(&data).to_string();

        tracing::info!(
            "☁️  Uploading {} as {} ({} bytes, {})",
            path.display(),
            name,
            data.len(),
            content_type
        );

        let url = if let Some(credentials) = &self.credentials {
            self.put_blob(&credentials.signed_url(&name), data, &content_type)
                .await?;
            credentials.blob_url(&name)
        } else if let Some(api_base) = &self.api_base {
            self.upload_via_backend(api_base, &name, data, &content_type)
                .await?
        } else {
            return Err(StorageError::MissingConfiguration);
        };

        tracing::info!("✅ Stored blob at {}", url);
        Ok(StoredBlob {
            url,
            name,
            content_type,
        })
    }
}
