//! REST handlers for image generation, retrieval and deletion

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::error::{ImagesError, ImagesResult};
use crate::models::{
    DeleteImagesRequest, DeleteReport, DeleteStatus, GenerateImageRequest, SearchImagesQuery,
    SimpleMetadata,
};
use crate::repository::{EmbeddingIndex, MetadataRepository};
use crate::service::ImageService;

/// Documentation-only schema for the multipart search form.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchForm {
    /// Query text; takes precedence over the image when both are present
    pub text: Option<String>,
    /// Query image file
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<String>,
    /// Number of results to return (default 3)
    pub topk: Option<u64>,
}

/// OpenAPI documentation for the images API
#[derive(OpenApi)]
#[openapi(
    paths(
        generate_image,
        list_metadata,
        list_control_images,
        search_images,
        delete_images,
    ),
    components(
        schemas(
            GenerateImageRequest,
            SimpleMetadata,
            SearchForm,
            DeleteImagesRequest,
            DeleteReport,
            DeleteStatus,
        )
    ),
    tags(
        (name = "images", description = "Image generation and retrieval endpoints")
    )
)]
pub struct ApiDoc;

/// Create the images router with the service state applied
pub fn routes<M, V>(service: Arc<ImageService<M, V>>) -> Router
where
    M: MetadataRepository + 'static,
    V: EmbeddingIndex + 'static,
{
    Router::new()
        .route("/generate", post(generate_image))
        .route("/metadata", get(list_metadata))
        .route("/control-images", get(list_control_images))
        .route("/search", post(search_images))
        .route("/", delete(delete_images))
        .with_state(service)
}

/// Generate an image from a prompt and store it
#[utoipa::path(
    post,
    path = "/generate",
    tag = "images",
    request_body = GenerateImageRequest,
    responses(
        (status = 201, description = "Image generated and stored", body = SimpleMetadata),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn generate_image<M: MetadataRepository, V: EmbeddingIndex>(
    State(service): State<Arc<ImageService<M, V>>>,
    Json(request): Json<GenerateImageRequest>,
) -> ImagesResult<impl IntoResponse> {
    let metadata = service.generate_and_store(request).await?;
    Ok((StatusCode::CREATED, Json(metadata)))
}

/// Compact metadata for every stored image
#[utoipa::path(
    get,
    path = "/metadata",
    tag = "images",
    responses(
        (status = 200, description = "Stored image metadata", body = Vec<SimpleMetadata>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_metadata<M: MetadataRepository, V: EmbeddingIndex>(
    State(service): State<Arc<ImageService<M, V>>>,
) -> ImagesResult<Json<Vec<SimpleMetadata>>> {
    let metadata = service.list_simple_metadata().await?;
    Ok(Json(metadata))
}

/// Filenames of the available conditioning images
#[utoipa::path(
    get,
    path = "/control-images",
    tag = "images",
    responses(
        (status = 200, description = "Conditioning image filenames", body = Vec<String>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_control_images<M: MetadataRepository, V: EmbeddingIndex>(
    State(service): State<Arc<ImageService<M, V>>>,
) -> ImagesResult<Json<Vec<String>>> {
    let filenames = service.list_control_images().await?;
    Ok(Json(filenames))
}

/// Search stored images by text or by example image
#[utoipa::path(
    post,
    path = "/search",
    tag = "images",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Similar images", body = Vec<SimpleMetadata>),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn search_images<M: MetadataRepository, V: EmbeddingIndex>(
    State(service): State<Arc<ImageService<M, V>>>,
    mut multipart: Multipart,
) -> ImagesResult<Json<Vec<SimpleMetadata>>> {
    let mut query = SearchImagesQuery::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ImagesError::Validation(format!("invalid multipart request: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("text") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ImagesError::Validation(format!("invalid text field: {e}")))?;
                query.text = Some(text);
            }
            Some("topk") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| ImagesError::Validation(format!("invalid topk field: {e}")))?;
                let topk = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ImagesError::Validation(format!("invalid topk value: {raw}")))?;
                query.topk = Some(topk);
            }
            Some("image") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ImagesError::Validation(format!("invalid image field: {e}")))?;
                query.image = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let results = service.search_similar(query).await?;
    Ok(Json(results))
}

/// Delete stored images across all stores
#[utoipa::path(
    delete,
    path = "/",
    tag = "images",
    request_body = DeleteImagesRequest,
    responses(
        (status = 200, description = "Per-filename delete report", body = DeleteReport),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_images<M: MetadataRepository, V: EmbeddingIndex>(
    State(service): State<Arc<ImageService<M, V>>>,
    Json(request): Json<DeleteImagesRequest>,
) -> ImagesResult<Json<DeleteReport>> {
    let report = service.delete_images(request).await?;
    Ok(Json(report))
}
