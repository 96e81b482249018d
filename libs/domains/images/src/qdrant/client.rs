use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    self, Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder, VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant};
use uuid::Uuid;

use super::QdrantConfig;
use crate::error::{ImagesError, ImagesResult};
use crate::repository::{EmbeddingIndex, NewEmbeddedPoint, ScoredPayload};

/// Name of the image-embedding vector within each point.
const IMAGE_VECTOR: &str = "image";
/// Name of the text-embedding vector within each point.
const TEXT_VECTOR: &str = "text";

/// Payload key the delete filter matches on.
const FILENAME_KEY: &str = "image_filename";

/// Qdrant-backed implementation of [`EmbeddingIndex`].
///
/// Each point carries two named vectors (`image` and `text`) over the same
/// payload; similarity search runs against the image space.
pub struct QdrantEmbeddingIndex {
    client: Qdrant,
    collection_name: String,
    embedding_dim: u64,
}

impl QdrantEmbeddingIndex {
    pub fn new(config: QdrantConfig) -> ImagesResult<Self> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(api_key) = config.api_key {
            builder = builder.api_key(api_key);
        }

        builder = builder.timeout(Duration::from_secs(config.timeout_secs));

        let client = builder
            .build()
            .map_err(|e| ImagesError::Index(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            collection_name: config.collection_name,
            embedding_dim: config.embedding_dim,
        })
    }

    pub fn from_client(client: Qdrant, collection_name: String, embedding_dim: u64) -> Self {
        Self {
            client,
            collection_name,
            embedding_dim,
        }
    }

    /// Liveness probe against the Qdrant instance.
    pub async fn ping(&self) -> ImagesResult<()> {
        self.client.health_check().await?;
        Ok(())
    }

    fn payload_for(point: &NewEmbeddedPoint) -> ImagesResult<Payload> {
        Payload::try_from(serde_json::json!({
            "image_filename": point.image_filename,
            "prompt": point.prompt,
        }))
        .map_err(|e| ImagesError::Index(format!("Invalid payload: {}", e)))
    }
}

#[async_trait]
impl EmbeddingIndex for QdrantEmbeddingIndex {
    async fn ensure_collection(&self) -> ImagesResult<()> {
        if self.client.collection_exists(&self.collection_name).await? {
            return Ok(());
        }

        let mut vectors_config = VectorsConfigBuilder::default();
        vectors_config.add_named_vector_params(
            IMAGE_VECTOR,
            VectorParamsBuilder::new(self.embedding_dim, Distance::Cosine),
        );
        vectors_config.add_named_vector_params(
            TEXT_VECTOR,
            VectorParamsBuilder::new(self.embedding_dim, Distance::Cosine),
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection_name)
                    .vectors_config(vectors_config),
            )
            .await?;

        tracing::info!(collection = %self.collection_name, "Created embedding collection");
        Ok(())
    }

    async fn upsert(&self, point: NewEmbeddedPoint) -> ImagesResult<()> {
        let payload = Self::payload_for(&point)?;

        let vectors: HashMap<String, Vec<f32>> = HashMap::from([
            (IMAGE_VECTOR.to_string(), point.image_embedding),
            (TEXT_VECTOR.to_string(), point.text_embedding),
        ]);

        let point = PointStruct::new(Uuid::new_v4().to_string(), vectors, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, vec![point]))
            .await?;

        Ok(())
    }

    async fn search(&self, query: Vec<f32>, limit: u64) -> ImagesResult<Vec<ScoredPayload>> {
        let builder = SearchPointsBuilder::new(&self.collection_name, query, limit)
            .vector_name(IMAGE_VECTOR)
            .with_payload(true)
            .with_vectors(false);

        let results = self.client.search_points(builder).await?;

        Ok(results
            .result
            .into_iter()
            .map(|point| ScoredPayload {
                score: point.score,
                payload: payload_to_json(point.payload),
            })
            .collect())
    }

    async fn delete_by_filename(&self, image_filename: &str) -> ImagesResult<bool> {
        let scroll = self
            .client
            .scroll(
                ScrollPointsBuilder::new(&self.collection_name)
                    .filter(Filter::must([Condition::matches(
                        FILENAME_KEY,
                        image_filename.to_string(),
                    )]))
                    .limit(1),
            )
            .await?;

        let Some(point) = scroll.result.into_iter().next() else {
            return Ok(false);
        };

        let Some(point_id) = point.id else {
            return Err(ImagesError::Index("Point is missing its ID".to_string()));
        };

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(vec![point_id])
                    .wait(true),
            )
            .await?;

        Ok(true)
    }
}

fn payload_to_json(payload: HashMap<String, QdrantValue>) -> Option<serde_json::Value> {
    if payload.is_empty() {
        return None;
    }

    let mut map = serde_json::Map::new();
    for (key, val) in payload {
        if let Some(json_val) = qdrant_value_to_json(val) {
            map.insert(key, json_val);
        }
    }

    Some(serde_json::Value::Object(map))
}

fn qdrant_value_to_json(val: QdrantValue) -> Option<serde_json::Value> {
    use qdrant::value::Kind;

    match val.kind {
        Some(Kind::NullValue(_)) => Some(serde_json::Value::Null),
        Some(Kind::BoolValue(b)) => Some(serde_json::Value::Bool(b)),
        Some(Kind::IntegerValue(i)) => Some(serde_json::Value::Number(i.into())),
        Some(Kind::DoubleValue(f)) => {
            serde_json::Number::from_f64(f).map(serde_json::Value::Number)
        }
        Some(Kind::StringValue(s)) => Some(serde_json::Value::String(s)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_conversion_keeps_scalar_fields() {
        let payload = HashMap::from([
            (
                "image_filename".to_string(),
                QdrantValue::from("a.png".to_string()),
            ),
            ("prompt".to_string(), QdrantValue::from("a cat".to_string())),
        ]);

        let json = payload_to_json(payload).unwrap();
        assert_eq!(json["image_filename"], "a.png");
        assert_eq!(json["prompt"], "a cat");
    }

    #[test]
    fn empty_payload_converts_to_none() {
        assert!(payload_to_json(HashMap::new()).is_none());
    }
}
