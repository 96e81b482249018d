use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, DbErr, EntityTrait, QueryOrder};

use crate::{
    entity,
    error::{ImagesError, ImagesResult},
    models::{ImageMetadata, NewImageMetadata},
    repository::MetadataRepository,
};

/// SQLite connection configuration
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    pub path: String,
}

impl SqliteConfig {
    pub fn new(path: String) -> Self {
        Self { path }
    }

    pub fn from_env() -> Self {
        let path =
            std::env::var("SQLITE_PATH").unwrap_or_else(|_| "data/metadata.db".to_string());
        Self { path }
    }

    /// Connection URL; `mode=rwc` creates the database file when missing.
    pub fn url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.path)
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "data/metadata.db".to_string(),
        }
    }
}

/// Open a connection to the configured SQLite database.
pub async fn connect(config: &SqliteConfig) -> Result<DatabaseConnection, DbErr> {
    Database::connect(config.url()).await
}

/// SQLite-backed implementation of [`MetadataRepository`]
pub struct SqliteMetadataRepository {
    db: DatabaseConnection,
}

impl SqliteMetadataRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl MetadataRepository for SqliteMetadataRepository {
    async fn insert(&self, input: NewImageMetadata) -> ImagesResult<ImageMetadata> {
        let active_model: entity::ActiveModel = input.into();

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(|e| ImagesError::Database(e.to_string()))?;

        tracing::info!(image_filename = %model.image_filename, "Stored image metadata");
        Ok(model.into())
    }

    async fn list(&self) -> ImagesResult<Vec<ImageMetadata>> {
        let models = entity::Entity::find()
            .order_by_desc(entity::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| ImagesError::Database(e.to_string()))?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    async fn delete(&self, image_filename: &str) -> ImagesResult<bool> {
        let result = entity::Entity::delete_by_id(image_filename)
            .exec(&self.db)
            .await
            .map_err(|e| ImagesError::Database(e.to_string()))?;

        if result.rows_affected > 0 {
            tracing::info!(image_filename, "Deleted image metadata");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
