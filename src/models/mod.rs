use crate::config::FaceRecognitionOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Per-upload parameters supplied by the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UploadOptions {
    #[validate(range(min = 1))]
    pub event_id: i64,
    #[validate(range(min = 1))]
    pub user_id: i64,
    #[validate(length(max = 512))]
    pub location: Option<String>,
    pub exif: Option<Map<String, Value>>,
    /// Overrides the pipeline's default recognition options
    #[validate(nested)]
    pub face: Option<FaceRecognitionOptions>,
}

impl UploadOptions {
    pub fn new(event_id: i64, user_id: i64) -> Self {
        Self {
            event_id,
            user_id,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: String,
    pub event_id: i64,
    pub file_url: String,
    pub file_type: String,
    pub location: Option<String>,
    pub exif: Option<Map<String, Value>>,
    pub uploaded_by: i64,
    pub tagged_users: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

/// Row to insert; the store assigns the id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewMediaRecord {
    pub event_id: i64,
    pub file_url: String,
    pub file_type: String,
    pub location: Option<String>,
    pub exif: Option<Map<String, Value>>,
    pub uploaded_by: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn from_slice(coords: &[f64]) -> Option<Self> {
        match coords {
            [x1, y1, x2, y2] => Some(Self {
                x1: *x1,
                y1: *y1,
                x2: *x2,
                y2: *y2,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    pub user_id: i64,
    pub similarity: f64,
    pub embedding_id: Option<String>,
}

/// One face found in an image, with its candidate users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub index: usize,
    pub bounding_box: Option<BoundingBox>,
    pub probability: Option<f64>,
    pub matches: Vec<FaceMatch>,
    pub primary_user_id: Option<i64>,
    pub auto_enrolled_user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UntaggedReason {
    RecognitionDisabled,
    IdentificationFailed(String),
    TagUpdateFailed(String),
}

impl std::fmt::Display for UntaggedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UntaggedReason::RecognitionDisabled => write!(f, "face recognition disabled"),
            UntaggedReason::IdentificationFailed(e) => write!(f, "identification failed: {}", e),
            UntaggedReason::TagUpdateFailed(e) => write!(f, "tag update failed: {}", e),
        }
    }
}

/// How the tagging half of the pipeline ended. Both variants are successes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaggingOutcome {
    Completed {
        tagged_users: Vec<i64>,
        face_count: usize,
    },
    CompletedUntagged {
        reason: UntaggedReason,
        face_count: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub media_id: String,
    pub file_url: String,
    pub blob_name: String,
    pub tagging: TaggingOutcome,
}

impl UploadResult {
    pub fn tagged_users(&self) -> &[i64] {
        match &self.tagging {
            TaggingOutcome::Completed { tagged_users, .. } => tagged_users,
            TaggingOutcome::CompletedUntagged { .. } => &[],
        }
    }

    pub fn face_count(&self) -> usize {
        match &self.tagging {
            TaggingOutcome::Completed { face_count, .. }
            | TaggingOutcome::CompletedUntagged { face_count, .. } => *face_count,
        }
    }

    pub fn is_untagged(&self) -> bool {
        matches!(self.tagging, TaggingOutcome::CompletedUntagged { .. })
    }
}

/// Batch outcome with the failures kept for reporting
#[derive(Debug, Default)]
pub struct BatchReport {
    pub uploaded: Vec<UploadResult>,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideshowRequest {
    pub event_id: String,
    pub theme_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_choice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideshowJob {
    pub status: String,
    #[serde(default)]
    pub message: String,
    /// Absent when the backend rendered synchronously
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub slideshow_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobState,
    #[serde(default)]
    pub message: String,
    pub slideshow_url: Option<String>,
    pub error: Option<String>,
}
