use crate::error::ApiError;
use crate::services::metadata::MetadataService;
use reqwest::{Client, multipart};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const ENROLL_PATH: &str = "/api/face/enroll_local";
pub const ENROLL_BATCH_PATH: &str = "/api/face/enroll_local_batch";

/// Registers reference faces for a user with the recognition backend
pub struct EnrollmentClient {
    http: Client,
    api_base: String,
}

impl EnrollmentClient {
    pub fn new(http: Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn enroll(&self, user_id: i64, path: &Path) -> Result<Value, ApiError> {
        let form = multipart::Form::new().part("file", image_part(path).await?);
        let payload = self.post(ENROLL_PATH, user_id, form).await?;
        tracing::info!("👤 Enrolled {} for user {}", path.display(), user_id);
        Ok(payload)
    }

    /// One multipart `files` part per image
    pub async fn enroll_batch(&self, user_id: i64, paths: &[PathBuf]) -> Result<Value, ApiError> {
        if paths.is_empty() {
            return Err(ApiError::InvalidRequest(
                "batch enrollment needs at least one image".to_string(),
            ));
        }

        let mut form = multipart::Form::new();
        for path in paths {
            form = form.part("files", image_part(path).await?);
        }

        let payload = self.post(ENROLL_BATCH_PATH, user_id, form).await?;
        tracing::info!(
            "👥 Batch enrollment for user {}: {} image(s) sent",
            user_id,
            paths.len()
        );
        Ok(payload)
    }

    async fn post(
        &self,
        endpoint: &str,
        user_id: i64,
        form: multipart::Form,
    ) -> Result<Value, ApiError> {
        let response = self
            .http
            .post(format!("{}{}", self.api_base, endpoint))
            .query(&[("user_id", user_id)])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::UnexpectedStatus { status, body });
        }

        let payload: Value =
            serde_json::from_str(&body).map_err(|e| ApiError::Malformed(e.to_string()))?;
        check_payload(payload)
    }
}

/// `{ok: false, reason}` is a refusal even under a 2xx status
fn check_payload(payload: Value) -> Result<Value, ApiError> {
    if payload.get("ok").and_then(Value::as_bool) == Some(false) {
        let reason = payload
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Err(ApiError::Rejected(reason));
    }
    Ok(payload)
}

async fn image_part(path: &Path) -> Result<multipart::Part, ApiError> {
    let data = tokio::fs::read(path).await.map_err(|source| ApiError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image.jpg".to_string());
    let content_type = MetadataService::detect_mime(&data);

    Ok(multipart::Part::bytes(data)
        .file_name(file_name)
        .mime_str(content_type)?)
}
