use crate::config::PipelineConfig;
use crate::services::blob_storage::{AzureBlobUploader, BlobUploader};
use reqwest::Client;
use std::sync::Arc;
use tracing::info;

/// Shared HTTP client for storage and backend calls
pub fn setup_http_client(config: &PipelineConfig) -> anyhow::Result<Client> {
    let mut builder = Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(timeout) = config.http_timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

pub fn setup_storage(config: &PipelineConfig, http: Client) -> Arc<dyn BlobUploader> {
    match (&config.storage, config.api_base()) {
        (Some(credentials), _) => info!(
            "☁️  Blob Storage: {} (Container: {}, static credentials)",
            credentials.account_endpoint(),
            credentials.container
        ),
        (None, Some(base)) => info!(
            "☁️  Blob Storage: via backend {} (probe: {})",
            base, config.probe_before_upload
        ),
        (None, None) => tracing::warn!("⚠️  Blob Storage: no route configured"),
    }

    Arc::new(AzureBlobUploader::from_config(config, http))
}
