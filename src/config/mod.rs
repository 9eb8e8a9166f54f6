use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use validator::Validate;

/// Static blob storage credentials (account + container + SAS token)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub account: String,
    pub container: String,
    /// SAS query string, without the leading `?`
    pub sas_token: String,
    /// Overrides `https://{account}.blob.core.windows.net`
    pub endpoint: Option<String>,
}

impl StorageCredentials {
    /// Base URL of the storage account, without a trailing slash
    pub fn account_endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.blob.core.windows.net", self.account),
        }
    }

    /// Durable URL of a blob inside the configured container (no SAS)
    pub fn blob_url(&self, blob_name: &str) -> String {
        format!("{}/{}/{}", self.account_endpoint(), self.container, blob_name)
    }

    /// Authorized write URL for a blob
    pub fn signed_url(&self, blob_name: &str) -> String {
        format!(
            "{}?{}",
            self.blob_url(blob_name),
            self.sas_token.trim_start_matches('?')
        )
    }

    fn check(&self) -> Result<(), ConfigError> {
        let missing: Vec<&str> = [
            ("account", self.account.is_empty()),
            ("container", self.container.is_empty()),
            ("sas_token", self.sas_token.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::IncompleteCredentials(missing.join(", ")))
        }
    }
}

/// Options forwarded to the remote multi-face identification endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FaceRecognitionOptions {
    /// Candidate matches returned per detected face (default: 3)
    #[validate(range(min = 1, max = 50))]
    pub top_k_per_face: u32,

    /// Similarity a match needs to be tagged (default: 0.6)
    #[validate(range(min = 0.0, max = 1.0))]
    pub threshold: f64,

    /// Ask the service to drop matches below the threshold (default: false)
    pub filter_matches: bool,

    /// Minimum detection probability for a face to be considered (default: 0.0)
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_prob: f64,

    /// Enroll the query face into the matched user's gallery (default: false)
    pub auto_enroll_on_identify: bool,

    /// Similarity floor for auto-enrollment (default: 0.85)
    #[validate(range(min = 0.0, max = 1.0))]
    pub auto_enroll_min_similarity: f64,

    /// Attribute each user to at most one face (default: false)
    pub exclusive_assignment: bool,
}

impl Default for FaceRecognitionOptions {
    fn default() -> Self {
        Self {
            top_k_per_face: 3,
            threshold: 0.6,
            filter_matches: false,
            min_prob: 0.0,
            auto_enroll_on_identify: false,
            auto_enroll_min_similarity: 0.85,
            exclusive_assignment: false,
        }
    }
}

impl FaceRecognitionOptions {
    /// Query string pairs understood by the identify endpoint
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("top_k_per_face", self.top_k_per_face.to_string()),
            ("threshold", self.threshold.to_string()),
            ("filter_matches", self.filter_matches.to_string()),
            ("min_prob", self.min_prob.to_string()),
            (
                "auto_enroll_on_identify",
                self.auto_enroll_on_identify.to_string(),
            ),
            (
                "auto_enroll_min_similarity",
                self.auto_enroll_min_similarity.to_string(),
            ),
            ("exclusive_assignment", self.exclusive_assignment.to_string()),
        ]
    }

    fn from_env() -> Self {
        let default = Self::default();
        Self {
            top_k_per_face: parse_env("FACE_TOP_K").unwrap_or(default.top_k_per_face),
            threshold: parse_env("FACE_THRESHOLD").unwrap_or(default.threshold),
            filter_matches: flag_env("FACE_FILTER_MATCHES").unwrap_or(default.filter_matches),
            min_prob: parse_env("FACE_MIN_PROB").unwrap_or(default.min_prob),
            auto_enroll_on_identify: flag_env("FACE_AUTO_ENROLL")
                .unwrap_or(default.auto_enroll_on_identify),
            auto_enroll_min_similarity: parse_env("FACE_AUTO_ENROLL_MIN_SIMILARITY")
                .unwrap_or(default.auto_enroll_min_similarity),
            exclusive_assignment: flag_env("FACE_EXCLUSIVE_ASSIGNMENT")
                .unwrap_or(default.exclusive_assignment),
        }
    }
}

/// Pipeline configuration, built once at startup and handed to each client
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Media store connection string (default: "sqlite://dumpy.db?mode=rwc")
    pub database_url: String,

    /// Backend base URL for token issuance, proxy upload, faces and slideshows
    pub api_base_url: Option<String>,

    /// Static storage credentials; preferred over the token endpoint when set
    pub storage: Option<StorageCredentials>,

    /// HEAD the pre-signed URL before transferring (default: true)
    pub probe_before_upload: bool,

    /// Defaults for face identification
    pub face: FaceRecognitionOptions,

    /// Read EXIF from the image when the caller supplies none (default: true)
    pub extract_exif: bool,

    /// Slideshow job status poll interval (default: 5s)
    pub slideshow_poll_interval: Duration,

    /// Request timeout; transport default when unset
    pub http_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://dumpy.db?mode=rwc".to_string(),
            api_base_url: None,
            storage: None,
            probe_before_upload: true,
            face: FaceRecognitionOptions::default(),
            extract_exif: true,
            slideshow_poll_interval: Duration::from_secs(5),
            http_timeout: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        let storage = match (
            env::var("AZURE_STORAGE_ACCOUNT").ok(),
            env::var("AZURE_STORAGE_SAS_TOKEN").ok(),
        ) {
            (None, None) => None,
            (account, sas_token) => Some(StorageCredentials {
                account: account.unwrap_or_default(),
                container: env::var("AZURE_STORAGE_CONTAINER")
                    .unwrap_or_else(|_| "event-media".to_string()),
                sas_token: sas_token.unwrap_or_default(),
                endpoint: env::var("AZURE_BLOB_ENDPOINT").ok(),
            }),
        };

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            api_base_url: env::var("DUMPY_API_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            storage,

            probe_before_upload: flag_env("STORAGE_PROBE_BEFORE_UPLOAD")
                .unwrap_or(default.probe_before_upload),

            face: FaceRecognitionOptions::from_env(),

            extract_exif: flag_env("EXTRACT_EXIF").unwrap_or(default.extract_exif),

            slideshow_poll_interval: parse_env("SLIDESHOW_POLL_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.slideshow_poll_interval),

            http_timeout: parse_env("HTTP_TIMEOUT_SECS").map(Duration::from_secs),
        }
    }

    /// Create config for local development against a backend on port 8000
    pub fn development() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            api_base_url: Some("http://127.0.0.1:8000".to_string()),
            probe_before_upload: false,
            ..Self::default()
        }
    }

    /// Fail fast on configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(storage) = &self.storage {
            storage.check()?;
        }

        if let Some(base) = &self.api_base_url {
            url::Url::parse(base).map_err(|e| ConfigError::InvalidUrl {
                url: base.clone(),
                reason: e.to_string(),
            })?;
        }

        if self.storage.is_none() && self.api_base_url.is_none() {
            return Err(ConfigError::NoStorageRoute);
        }

        self.face
            .validate()
            .map_err(|e| ConfigError::InvalidFaceOptions(e.to_string()))?;

        if self.slideshow_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "SLIDESHOW_POLL_INTERVAL_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Backend base URL without a trailing slash
    pub fn api_base(&self) -> Option<&str> {
        self.api_base_url
            .as_deref()
            .map(|base| base.trim_end_matches('/'))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn flag_env(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v.to_lowercase() != "false" && v != "0")
}
