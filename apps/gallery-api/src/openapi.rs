//! OpenAPI documentation configuration

use utoipa::OpenApi;

/// Combined OpenAPI documentation for the Gallery API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gallery API",
        version = "0.1.0",
        description = "Prompt-to-image generation and similarity search API",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    nest(
        (path = "/api/images", api = domain_images::ApiDoc)
    ),
    tags(
        (name = "images", description = "Image generation and retrieval endpoints")
    )
)]
pub struct ApiDoc;
