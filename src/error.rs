use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No storage route: set AZURE_STORAGE_ACCOUNT + AZURE_STORAGE_SAS_TOKEN or DUMPY_API_BASE_URL")]
    NoStorageRoute,

    #[error("Incomplete storage credentials, missing: {0}")]
    IncompleteCredentials(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid face recognition options: {0}")]
    InvalidFaceOptions(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("{0} requires DUMPY_API_BASE_URL")]
    MissingApiBase(&'static str),
}

/// Failures of the blob upload step. All of them abort the pipeline.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("No storage credentials and no token endpoint configured")]
    MissingConfiguration,

    #[error("Storage rejected authorization ({status}): {body}")]
    Unauthorized { status: StatusCode, body: String },

    #[error("Blob transfer failed ({status}): {body}")]
    TransferFailed { status: StatusCode, body: String },

    #[error("Token endpoint unavailable ({token_error}) and proxy upload failed ({proxy_error})")]
    Unavailable {
        token_error: String,
        proxy_error: String,
    },

    #[error("Unexpected response from {endpoint}: {reason}")]
    BadResponse { endpoint: String, reason: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures talking to the backend (faces, enrollment, slideshows).
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Face recognition is disabled")]
    Disabled,

    #[error("Cancelled")]
    Cancelled,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal failures of the upload pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid upload options: {0}")]
    InvalidOptions(String),

    #[error("Invalid image {path}: {reason}")]
    InvalidImage { path: String, reason: String },

    #[error("Blob upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("Media record insert failed: {0}")]
    RecordInsert(#[source] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl PipelineError {
    /// Whether the failure happened after the blob was written
    pub fn left_orphan_blob(&self) -> bool {
        matches!(self, PipelineError::RecordInsert(_))
    }
}
