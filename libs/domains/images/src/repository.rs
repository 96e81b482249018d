use std::path::PathBuf;

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};

use crate::error::ImagesResult;
use crate::models::{ImageMetadata, NewImageMetadata};

/// A point about to be written to the vector index: both embeddings plus
/// the payload that ties the point back to the stored artifact.
#[derive(Debug, Clone)]
pub struct NewEmbeddedPoint {
    pub image_embedding: Vec<f32>,
    pub text_embedding: Vec<f32>,
    pub image_filename: String,
    pub prompt: String,
}

/// A scored hit from the vector index, payload still undecoded.
#[derive(Debug, Clone)]
pub struct ScoredPayload {
    pub score: f32,
    pub payload: Option<serde_json::Value>,
}

/// Repository trait for relational metadata persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Insert a new metadata record
    async fn insert(&self, input: NewImageMetadata) -> ImagesResult<ImageMetadata>;

    /// List all records, newest first
    async fn list(&self) -> ImagesResult<Vec<ImageMetadata>>;

    /// Delete a record by filename; false when no record matched
    async fn delete(&self, image_filename: &str) -> ImagesResult<bool>;
}

/// Repository trait for the vector index.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingIndex: Send + Sync {
    /// Create the backing collection when it does not exist yet
    async fn ensure_collection(&self) -> ImagesResult<()>;

    /// Upsert one point carrying both embeddings
    async fn upsert(&self, point: NewEmbeddedPoint) -> ImagesResult<()>;

    /// Search against the image vector space
    async fn search(&self, query: Vec<f32>, limit: u64) -> ImagesResult<Vec<ScoredPayload>>;

    /// Delete the point carrying the given filename; false when absent
    async fn delete_by_filename(&self, image_filename: &str) -> ImagesResult<bool>;
}

/// Filesystem store for generated artifacts and conditioning images.
///
/// Methods are synchronous; callers doing heavy work wrap them together
/// with inference in a blocking task.
#[cfg_attr(test, mockall::automock)]
pub trait ImageStore: Send + Sync {
    /// Persist a generated image as PNG, returning its path
    fn save_image(&self, image: &RgbImage, image_filename: &str) -> ImagesResult<PathBuf>;

    /// Load a conditioning image by filename
    fn load_control_image(&self, filename: &str) -> ImagesResult<DynamicImage>;

    /// Delete a generated image; false when the file was absent
    fn delete_image(&self, image_filename: &str) -> ImagesResult<bool>;

    /// Filenames of all conditioning images, sorted
    fn list_control_filenames(&self) -> ImagesResult<Vec<String>>;
}
