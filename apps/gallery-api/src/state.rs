//! Application state management

use std::sync::Arc;

use domain_images::{ImageService, QdrantEmbeddingIndex, SqliteMetadataRepository};
use sea_orm::DatabaseConnection;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    pub db: DatabaseConnection,
    pub service: Arc<ImageService<SqliteMetadataRepository, QdrantEmbeddingIndex>>,
}
