use crate::config::{FaceRecognitionOptions, PipelineConfig};
use crate::error::ApiError;
use crate::models::{BoundingBox, DetectedFace, FaceMatch};
use crate::services::metadata::MetadataService;
use async_trait::async_trait;
use reqwest::{Client, multipart};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

pub const IDENTIFY_PATH: &str = "/api/face/identify_multi_local_grouped";

/// Reason the service reports when an image holds no face
const NO_FACE_DETECTED: &str = "no_face_detected";

#[async_trait]
pub trait FaceTagger: Send + Sync {
    async fn identify(
        &self,
        path: &Path,
        options: &FaceRecognitionOptions,
    ) -> Result<Vec<DetectedFace>, ApiError>;
    fn name(&self) -> &str;
}

/// Used when no backend is configured
pub struct NoOpFaceTagger;

#[async_trait]
impl FaceTagger for NoOpFaceTagger {
    async fn identify(
        &self,
        _path: &Path,
        _options: &FaceRecognitionOptions,
    ) -> Result<Vec<DetectedFace>, ApiError> {
        Err(ApiError::Disabled)
    }

    fn name(&self) -> &str {
        "NoOp"
    }
}

/// Grouped envelope; `ok` and `reason` are only present on some backends
#[derive(Debug, Deserialize)]
struct GroupedResponse {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    faces: Option<Vec<RawFace>>,
}

#[derive(Debug, Deserialize)]
struct RawFace {
    #[serde(rename = "box", default)]
    bbox: Option<Vec<f64>>,
    #[serde(alias = "probability", default)]
    prob: Option<f64>,
    #[serde(default)]
    matches: Option<Vec<RawMatch>>,
    /// Older backends name the candidate list `results`
    #[serde(default)]
    results: Option<Vec<RawMatch>>,
    #[serde(default)]
    primary_user_id: Option<i64>,
    #[serde(default)]
    auto_enrolled_user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    user_id: i64,
    similarity: f64,
    #[serde(default)]
    embedding_id: Option<String>,
}

impl From<RawMatch> for FaceMatch {
    fn from(raw: RawMatch) -> Self {
        FaceMatch {
            user_id: raw.user_id,
            similarity: raw.similarity,
            embedding_id: raw.embedding_id,
        }
    }
}

impl RawFace {
    fn into_detected(self, index: usize) -> DetectedFace {
        let matches = self.matches.or(self.results).unwrap_or_default();

        DetectedFace {
            index,
            bounding_box: self.bbox.as_deref().and_then(BoundingBox::from_slice),
            probability: self.prob,
            matches: matches.into_iter().map(FaceMatch::from).collect(),
            primary_user_id: self.primary_user_id,
            auto_enrolled_user_id: self.auto_enrolled_user_id,
        }
    }
}

fn malformed(e: serde_json::Error) -> ApiError {
    ApiError::Malformed(e.to_string())
}

/// Turns any accepted response shape into a face list with sequential indices
pub fn normalize_response(body: &str) -> Result<Vec<DetectedFace>, ApiError> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(malformed)?;

    let faces = if value.is_array() {
        serde_json::from_value::<Vec<RawFace>>(value).map_err(malformed)?
    } else {
        let grouped: GroupedResponse = serde_json::from_value(value).map_err(malformed)?;
        match (grouped.ok, grouped.faces) {
            (Some(false), _) => match grouped.reason {
                Some(reason) if reason == NO_FACE_DETECTED => Vec::new(),
                Some(reason) => return Err(ApiError::Rejected(reason)),
                None => return Err(ApiError::Rejected("unspecified".to_string())),
            },
            (_, Some(faces)) => faces,
            (Some(true), None) => Vec::new(),
            (None, None) => {
                return Err(ApiError::Malformed(
                    "response carries neither faces nor ok".to_string(),
                ));
            }
        }
    };

    Ok(faces
        .into_iter()
        .enumerate()
        .map(|(index, face)| face.into_detected(index))
        .collect())
}

/// Client for the backend's multi-face identification endpoint
pub struct RemoteFaceTagger {
    http: Client,
    api_base: String,
}

impl RemoteFaceTagger {
    pub fn new(http: Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// `NoOpFaceTagger` stands in when no backend is configured
    pub fn from_config(config: &PipelineConfig, http: Client) -> Arc<dyn FaceTagger> {
        match config.api_base() {
            Some(base) => Arc::new(Self::new(http, base)),
            None => {
                tracing::warn!("⚠️  No backend configured, face tagging disabled");
                Arc::new(NoOpFaceTagger)
            }
        }
    }
}

#[async_trait]
impl FaceTagger for RemoteFaceTagger {
    async fn identify(
        &self,
        path: &Path,
        options: &FaceRecognitionOptions,
    ) -> Result<Vec<DetectedFace>, ApiError> {
        let data = tokio::fs::read(path).await.map_err(|source| ApiError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());
        let content_type = MetadataService::detect_mime(&data);

        let part = multipart::Part::bytes(data)
            .file_name(file_name)
            .mime_str(content_type)?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}{}", self.api_base, IDENTIFY_PATH))
            .query(&options.query_pairs())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::UnexpectedStatus { status, body });
        }

        let faces = normalize_response(&body)?;
        tracing::info!(
            "🔎 Identified {} face(s) in {}",
            faces.len(),
            path.display()
        );
        Ok(faces)
    }

    fn name(&self) -> &str {
        "Remote"
    }
}
