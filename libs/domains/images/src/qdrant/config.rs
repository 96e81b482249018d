/// Qdrant connection and collection configuration
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub collection_name: String,
    pub embedding_dim: u64,
}

impl QdrantConfig {
    pub fn new(url: String) -> Self {
        Self {
            url,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn with_collection(mut self, collection_name: String) -> Self {
        self.collection_name = collection_name;
        self
    }

    pub fn with_embedding_dim(mut self, embedding_dim: u64) -> Self {
        self.embedding_dim = embedding_dim;
        self
    }

    pub fn from_env() -> Self {
        let url =
            std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6334".to_string());

        let api_key = std::env::var("QDRANT_API_KEY").ok();

        let timeout_secs = std::env::var("QDRANT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let collection_name =
            std::env::var("QDRANT_COLLECTION").unwrap_or_else(|_| "image_embeddings".to_string());

        let embedding_dim = std::env::var("EMBEDDING_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(512);

        Self {
            url,
            api_key,
            timeout_secs,
            collection_name,
            embedding_dim,
        }
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            timeout_secs: 30,
            collection_name: "image_embeddings".to_string(),
            embedding_dim: 512,
        }
    }
}
