pub mod config;
pub mod entities;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::PipelineConfig;
use crate::error::{ConfigError, PipelineError};
use crate::infrastructure::{database, storage};
use crate::services::enrollment::EnrollmentClient;
use crate::services::face_tagging::{FaceTagger, RemoteFaceTagger};
use crate::services::media_store::{DbMediaStore, MediaStore};
use crate::services::slideshow::SlideshowClient;
use crate::services::upload_orchestrator::UploadOrchestrator;
use std::sync::Arc;

/// Every client the pipeline needs, wired from one configuration
pub struct Pipeline {
    pub config: PipelineConfig,
    pub orchestrator: UploadOrchestrator,
    pub store: Arc<dyn MediaStore>,
    pub tagger: Arc<dyn FaceTagger>,
    enrollment: Option<EnrollmentClient>,
    slideshow: Option<SlideshowClient>,
}

impl Pipeline {
    pub async fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let db = database::setup_database(&config.database_url).await?;
        let http = storage::setup_http_client(&config)?;

        let uploader = storage::setup_storage(&config, http.clone());
        let store: Arc<dyn MediaStore> = Arc::new(DbMediaStore::new(db));
        let tagger = RemoteFaceTagger::from_config(&config, http.clone());

        let orchestrator = UploadOrchestrator::new(
            uploader,
            store.clone(),
            tagger.clone(),
            config.face.clone(),
            config.extract_exif,
        );

        let enrollment = config
            .api_base()
            .map(|base| EnrollmentClient::new(http.clone(), base));
        let slideshow = config
            .api_base()
            .map(|base| SlideshowClient::new(http.clone(), base));

        Ok(Self {
            config,
            orchestrator,
            store,
            tagger,
            enrollment,
            slideshow,
        })
    }

    pub fn enrollment(&self) -> Result<&EnrollmentClient, ConfigError> {
        self.enrollment
            .as_ref()
            .ok_or(ConfigError::MissingApiBase("face enrollment"))
    }

    pub fn slideshow(&self) -> Result<&SlideshowClient, ConfigError> {
        self.slideshow
            .as_ref()
            .ok_or(ConfigError::MissingApiBase("slideshow generation"))
    }
}
