use crate::error::ApiError;
use crate::models::{JobStatus, SlideshowJob, SlideshowRequest};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

pub const GENERATE_PATH: &str = "/api/slideshow/generate";
pub const STATUS_PATH: &str = "/api/slideshow/status";

pub struct SlideshowClient {
    http: Client,
    api_base: String,
}

impl SlideshowClient {
    pub fn new(http: Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Queues slideshow generation for an event
    pub async fn generate(&self, request: &SlideshowRequest) -> Result<SlideshowJob, ApiError> {
        if request.theme_prompt.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "theme prompt must not be empty".to_string(),
            ));
        }

        let response = self
            .http
            .post(format!("{}{}", self.api_base, GENERATE_PATH))
            .json(request)
            .send()
            .await?;

        let job: SlideshowJob = read_json(response).await?;
        tracing::info!(
            "🎬 Slideshow requested for event {}: {} ({})",
            request.event_id,
            job.status,
            job.job_id.as_deref().unwrap_or("no job id")
        );
        Ok(job)
    }

    pub async fn status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        let response = self
            .http
            .get(format!("{}{}/{}", self.api_base, STATUS_PATH, job_id))
            .send()
            .await?;
        read_json(response).await
    }

    /// Polls `job_id` every `interval` until it reaches a terminal state.
    /// Failed polls are logged and retried on the next tick.
    pub async fn watch(
        &self,
        job_id: &str,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<JobStatus, ApiError> {
        tracing::info!("👀 Watching slideshow job {}", job_id);

        loop {
            if *shutdown.borrow() {
                tracing::info!("🛑 Stopped watching job {}", job_id);
                return Err(ApiError::Cancelled);
            }

            match self.status(job_id).await {
                Ok(status) if status.status.is_terminal() => {
                    tracing::info!("✅ Job {} finished: {:?}", job_id, status.status);
                    return Ok(status);
                }
                Ok(status) => {
                    tracing::debug!("Job {} is {:?}: {}", job_id, status.status, status.message);
                }
                Err(e) => {
                    tracing::warn!("⚠️  Status poll for job {} failed: {}", job_id, e);
                }
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("🛑 Stopped watching job {}", job_id);
                        return Err(ApiError::Cancelled);
                    }
                }
                _ = sleep(interval) => {}
            }
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::UnexpectedStatus { status, body });
    }
    serde_json::from_str(&body).map_err(|e| ApiError::Malformed(e.to_string()))
}
