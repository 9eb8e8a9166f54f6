use crate::entities::{media, prelude::*};
use crate::models::{MediaRecord, NewMediaRecord};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use serde_json::{Value, json};
use uuid::Uuid;

/// Persisted media rows, keyed by generated id
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn insert_media(&self, record: NewMediaRecord) -> Result<MediaRecord>;
    async fn update_tagged_users(&self, media_id: &str, user_ids: &[i64]) -> Result<()>;
    async fn find_media(&self, media_id: &str) -> Result<Option<MediaRecord>>;
    async fn list_event_media(&self, event_id: i64) -> Result<Vec<MediaRecord>>;
}

pub struct DbMediaStore {
    db: DatabaseConnection,
}

impl DbMediaStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl TryFrom<media::Model> for MediaRecord {
    type Error = anyhow::Error;

    fn try_from(model: media::Model) -> Result<Self> {
        let exif = match model.exif {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };
        let tagged_users = serde_json::from_value(model.tagged_users)
            .with_context(|| format!("Corrupt tagged_users on media {}", model.id))?;

        Ok(MediaRecord {
            id: model.id,
            event_id: model.event_id,
            file_url: model.file_url,
            file_type: model.file_type,
            location: model.location,
            exif,
            uploaded_by: model.uploaded_by,
            tagged_users,
            created_at: model.created_at,
        })
    }
}

#[async_trait]
impl MediaStore for DbMediaStore {
    async fn insert_media(&self, record: NewMediaRecord) -> Result<MediaRecord> {
        let row = media::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            event_id: Set(record.event_id),
            file_url: Set(record.file_url),
            file_type: Set(record.file_type),
            location: Set(record.location),
            exif: Set(record.exif.map(Value::Object)),
            uploaded_by: Set(record.uploaded_by),
            tagged_users: Set(json!([])),
            created_at: Set(Utc::now()),
        };

        let saved = row.insert(&self.db).await?;
        saved.try_into()
    }

    async fn update_tagged_users(&self, media_id: &str, user_ids: &[i64]) -> Result<()> {
        let existing = Media::find_by_id(media_id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow!("Media record not found: {}", media_id))?;

        let mut active: media::ActiveModel = existing.into();
        active.tagged_users = Set(json!(user_ids));
        active.update(&self.db).await?;
        Ok(())
    }

    async fn find_media(&self, media_id: &str) -> Result<Option<MediaRecord>> {
        let found = Media::find_by_id(media_id.to_string()).one(&self.db).await?;
        found.map(MediaRecord::try_from).transpose()
    }

    async fn list_event_media(&self, event_id: i64) -> Result<Vec<MediaRecord>> {
        let rows = Media::find()
            .filter(media::Column::EventId.eq(event_id))
            .order_by_asc(media::Column::CreatedAt)
            .all(&self.db)
            .await?;
        rows.into_iter().map(MediaRecord::try_from).collect()
    }
}
