//! Gallery API - prompt-to-image generation and retrieval server

use std::sync::Arc;
use std::time::Duration;

use axum_helpers::server::{create_production_app, create_router, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_images::{
    EmbeddingIndex, ImageService, LocalImageStore, QdrantEmbeddingIndex, SqliteMetadataRepository,
};
use domain_inference::{ClipEncoder, ImageEncoder, SdPipeline};
use migration::{Migrator, MigratorTrait};
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    info!("Connecting to SQLite at {}", config.sqlite.path);
    let db = domain_images::connect_sqlite(&config.sqlite).await?;
    Migrator::up(&db, None).await?;
    info!("Database schema is up to date");

    // Weight downloads and model setup are blocking; keep them off the runtime.
    let diffusion_settings = config.diffusion.clone();
    let generator =
        tokio::task::spawn_blocking(move || SdPipeline::load(&diffusion_settings)).await??;

    let clip_settings = config.clip.clone();
    let encoder = tokio::task::spawn_blocking(move || ClipEncoder::load(&clip_settings)).await??;

    let mut qdrant_config = config.qdrant.clone();
    if qdrant_config.embedding_dim != encoder.dimension() as u64 {
        tracing::warn!(
            configured = qdrant_config.embedding_dim,
            actual = encoder.dimension(),
            "EMBEDDING_DIM does not match the encoder, using the encoder's dimension"
        );
        qdrant_config.embedding_dim = encoder.dimension() as u64;
    }

    let index = QdrantEmbeddingIndex::new(qdrant_config)?;
    index.ensure_collection().await?;

    let store = Arc::new(LocalImageStore::new(config.storage.clone())?);

    let service = Arc::new(ImageService::new(
        SqliteMetadataRepository::new(db.clone()),
        index,
        store,
        Arc::new(generator),
        Arc::new(encoder),
    ));

    let state = AppState {
        config: config.clone(),
        db: db.clone(),
        service,
    };

    let api_routes = api::routes(&state);
    let router = create_router::<openapi::ApiDoc>(api_routes).await?;
    let app = router
        .merge(health_router(state.config.app))
        .merge(api::health::router(state.clone()));

    info!("Starting Gallery API on port {}", state.config.server.port);

    create_production_app(app, &state.config.server, Duration::from_secs(30), async move {
        info!("Shutting down: closing database connection");
        if let Err(e) = db.close().await {
            tracing::warn!("Failed to close database connection cleanly: {e}");
        }
    })
    .await?;

    info!("Gallery API shutdown complete");
    Ok(())
}
