use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImagesError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Control image not found: {0}")]
    ControlImageNotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ImagesResult<T> = Result<T, ImagesError>;

impl From<sea_orm::DbErr> for ImagesError {
    fn from(err: sea_orm::DbErr) -> Self {
        ImagesError::Database(err.to_string())
    }
}

impl From<qdrant_client::QdrantError> for ImagesError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        ImagesError::Index(err.to_string())
    }
}

impl From<domain_inference::InferenceError> for ImagesError {
    fn from(err: domain_inference::InferenceError) -> Self {
        ImagesError::Inference(err.to_string())
    }
}

impl From<std::io::Error> for ImagesError {
    fn from(err: std::io::Error) -> Self {
        ImagesError::Storage(err.to_string())
    }
}

impl From<image::ImageError> for ImagesError {
    fn from(err: image::ImageError) -> Self {
        ImagesError::Storage(err.to_string())
    }
}

/// Convert ImagesError to AppError for standardized HTTP error responses
impl From<ImagesError> for AppError {
    fn from(err: ImagesError) -> Self {
        match err {
            ImagesError::NotFound(msg) => AppError::NotFound(msg),
            ImagesError::Validation(msg) => AppError::BadRequest(msg),
            ImagesError::ControlImageNotFound(name) => {
                AppError::BadRequest(format!("Control image {} not found", name))
            }
            ImagesError::Database(msg) => {
                AppError::InternalServerError(format!("Database error: {}", msg))
            }
            ImagesError::Index(msg) => {
                AppError::InternalServerError(format!("Vector index error: {}", msg))
            }
            ImagesError::Inference(msg) => {
                AppError::InternalServerError(format!("Inference error: {}", msg))
            }
            ImagesError::Storage(msg) => {
                AppError::InternalServerError(format!("Storage error: {}", msg))
            }
            ImagesError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for ImagesError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
