//! Images Domain Library
//!
//! Orchestration for prompt-to-image generation and retrieval. Everything
//! compute- or storage-heavy lives behind a seam; this crate owns the rules
//! that tie the seams together.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │                  ImageService                  │
//! │  conditioning rules · persistence fan-out ·    │
//! │  search reconciliation · delete reporting      │
//! └──┬───────────┬───────────┬───────────┬─────────┘
//!    │           │           │           │
//! ┌──▼─────┐ ┌───▼──────┐ ┌──▼───────┐ ┌─▼──────────────┐
//! │Metadata│ │Embedding │ │ImageStore│ │ImageGenerator/ │
//! │Reposi- │ │Index     │ │ (trait)  │ │ImageEncoder    │
//! │tory    │ │ (trait)  │ └──┬───────┘ │(domain_infer-  │
//! │(trait) │ └───┬──────┘    │         │ ence traits)   │
//! └──┬─────┘     │       ┌───▼──────┐  └────────────────┘
//! ┌──▼─────┐ ┌───▼─────┐ │LocalImage│
//! │ SQLite │ │ Qdrant  │ │  Store   │
//! │(sea-orm│ │ (named  │ └──────────┘
//! │ sqlite)│ │ vectors)│
//! └────────┘ └─────────┘
//! ```

pub mod conditioning;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod qdrant;
pub mod repository;
pub mod service;
pub mod sqlite;
pub mod storage;

pub use error::{ImagesError, ImagesResult};
pub use handlers::ApiDoc;
pub use models::{
    DeleteImagesRequest, DeleteReport, DeleteStatus, GenerateImageRequest, ImageMetadata,
    NewImageMetadata, PointPayload, SearchImagesQuery, SimpleMetadata,
};
pub use qdrant::{QdrantConfig, QdrantEmbeddingIndex};
pub use repository::{EmbeddingIndex, ImageStore, MetadataRepository, NewEmbeddedPoint, ScoredPayload};
pub use service::ImageService;
pub use sqlite::{connect as connect_sqlite, SqliteConfig, SqliteMetadataRepository};
pub use storage::{LocalImageStore, StorageConfig};
