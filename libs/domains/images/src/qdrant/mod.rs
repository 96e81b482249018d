mod client;
mod config;

pub use client::QdrantEmbeddingIndex;
pub use config::QdrantConfig;
