use image::{DynamicImage, RgbImage};

use crate::error::InferenceResult;
use crate::models::GenerationRequest;

/// Backend that synthesizes an image from a generation request.
///
/// Implementations are blocking and compute-bound; run them with
/// `tokio::task::spawn_blocking` from async contexts.
pub trait ImageGenerator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> InferenceResult<RgbImage>;
}

/// Backend that maps images and texts into a shared embedding space.
///
/// Both methods return L2-normalized vectors of [`ImageEncoder::dimension`]
/// width, so cosine similarity between an image embedding and a text
/// embedding is meaningful.
pub trait ImageEncoder: Send + Sync {
    fn encode_image(&self, image: &DynamicImage) -> InferenceResult<Vec<f32>>;

    fn encode_text(&self, text: &str) -> InferenceResult<Vec<f32>>;

    /// Width of the produced embedding vectors.
    fn dimension(&self) -> usize;
}
