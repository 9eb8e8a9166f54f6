use crate::config::FaceRecognitionOptions;
use crate::error::{ApiError, PipelineError};
use crate::models::{
    BatchReport, DetectedFace, NewMediaRecord, TaggingOutcome, UntaggedReason, UploadOptions,
    UploadResult,
};
use crate::services::blob_storage::BlobUploader;
use crate::services::face_tagging::FaceTagger;
use crate::services::media_store::MediaStore;
use crate::services::metadata::MetadataService;
use crate::utils::validation::{MAX_IMAGE_SIZE, validate_image};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use validator::Validate;

/// User ids whose similarity reaches `threshold` on any face, each once, ascending
pub fn select_tagged_users(faces: &[DetectedFace], threshold: f64) -> Vec<i64> {
    let users: BTreeSet<i64> = faces
        .iter()
        .flat_map(|face| face.matches.iter())
        .filter(|m| m.similarity >= threshold)
        .map(|m| m.user_id)
        .collect();
    users.into_iter().collect()
}

/// Drives upload → record → identify → tag for one photo at a time
pub struct UploadOrchestrator {
    uploader: Arc<dyn BlobUploader>,
    store: Arc<dyn MediaStore>,
    tagger: Arc<dyn FaceTagger>,
    defaults: FaceRecognitionOptions,
    extract_exif: bool,
}

impl UploadOrchestrator {
    pub fn new(
        uploader: Arc<dyn BlobUploader>,
        store: Arc<dyn MediaStore>,
        tagger: Arc<dyn FaceTagger>,
        defaults: FaceRecognitionOptions,
        extract_exif: bool,
    ) -> Self {
        Self {
            uploader,
            store,
            tagger,
            defaults,
            extract_exif,
        }
    }

    pub async fn upload_photo(
        &self,
        path: &Path,
        options: UploadOptions,
    ) -> Result<UploadResult, PipelineError> {
        options
            .validate()
            .map_err(|e| PipelineError::InvalidOptions(e.to_string()))?;
        let face_options = options.face.clone().unwrap_or_else(|| self.defaults.clone());

        // 0. Validate the image before anything leaves the device
        let invalid = |reason: String| PipelineError::InvalidImage {
            path: path.display().to_string(),
            reason,
        };
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| invalid(e.to_string()))?;
        let mime = validate_image(&bytes, MAX_IMAGE_SIZE).map_err(|e| invalid(e.to_string()))?;

        let exif = match options.exif {
            Some(exif) => Some(exif),
            None if self.extract_exif => MetadataService::extract_exif(&bytes),
            None => None,
        };
        drop(bytes);

        // 1. Blob upload
        let blob = self.uploader.upload(path, None).await?;

        // 2. Media record with no tags yet
        let record = self
            .store
            .insert_media(NewMediaRecord {
                event_id: options.event_id,
                file_url: blob.url.clone(),
                file_type: MetadataService::media_category(mime).to_string(),
                location: options.location,
                exif,
                uploaded_by: options.user_id,
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    "❌ Record insert failed after storing {}; blob left in place: {}",
                    blob.url,
                    e
                );
                PipelineError::RecordInsert(e)
            })?;

        tracing::info!("📝 Media {} recorded for event {}", record.id, record.event_id);

        let finish = |tagging: TaggingOutcome| UploadResult {
            media_id: record.id.clone(),
            file_url: blob.url.clone(),
            blob_name: blob.name.clone(),
            tagging,
        };

        // 3. Face identification (non-fatal)
        let faces = match self.tagger.identify(path, &face_options).await {
            Ok(faces) => faces,
            Err(ApiError::Disabled) => {
                return Ok(finish(TaggingOutcome::CompletedUntagged {
                    reason: UntaggedReason::RecognitionDisabled,
                    face_count: 0,
                }));
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️  Face identification failed for {} via {}: {}",
                    path.display(),
                    self.tagger.name(),
                    e
                );
                return Ok(finish(TaggingOutcome::CompletedUntagged {
                    reason: UntaggedReason::IdentificationFailed(e.to_string()),
                    face_count: 0,
                }));
            }
        };

        // 4. Threshold filter + dedup
        let tagged_users = select_tagged_users(&faces, face_options.threshold);
        let face_count = faces.len();

        // 5. Attach tags (non-fatal)
        if !tagged_users.is_empty() {
            if let Err(e) = self
                .store
                .update_tagged_users(&record.id, &tagged_users)
                .await
            {
                tracing::error!("❌ Tag update failed for media {}: {}", record.id, e);
                return Ok(finish(TaggingOutcome::CompletedUntagged {
                    reason: UntaggedReason::TagUpdateFailed(e.to_string()),
                    face_count,
                }));
            }
        }

        if face_count != tagged_users.len() {
            tracing::info!(
                "🏷️  {} face(s) detected, {} user(s) tagged on media {}",
                face_count,
                tagged_users.len(),
                record.id
            );
        } else {
            tracing::info!("🏷️  Tagged {:?} on media {}", tagged_users, record.id);
        }

        Ok(finish(TaggingOutcome::Completed {
            tagged_users,
            face_count,
        }))
    }

    /// Sequential batch; failed items are logged and left out
    pub async fn upload_batch(&self, paths: &[PathBuf], options: UploadOptions) -> Vec<UploadResult> {
        self.upload_batch_report(paths, options).await.uploaded
    }

    pub async fn upload_batch_report(
        &self,
        paths: &[PathBuf],
        options: UploadOptions,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for (i, path) in paths.iter().enumerate() {
            tracing::info!("📤 [{}/{}] {}", i + 1, paths.len(), path.display());
            match self.upload_photo(path, options.clone()).await {
                Ok(result) => report.uploaded.push(result),
                Err(e) => {
                    tracing::error!("❌ Skipping {}: {}", path.display(), e);
                    report
                        .failed
                        .push((path.display().to_string(), e.to_string()));
                }
            }
        }

        tracing::info!(
            "✅ Batch finished: {} uploaded, {} failed",
            report.uploaded.len(),
            report.failed.len()
        );
        report
    }
}
