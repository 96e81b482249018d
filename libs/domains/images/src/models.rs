use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Parameters for one image generation.
///
/// Two conditioning slots are exposed; a slot is active when its filename is
/// set, and each active slot must come with its conditioning scale and
/// guidance end. Cardinality rules live in [`crate::conditioning`].
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct GenerateImageRequest {
    /// Text prompt for the image
    #[validate(length(min = 1, max = 1000))]
    pub prompt: String,

    /// Width of the image in pixels (multiple of 8)
    #[validate(range(min = 64, max = 2048))]
    pub width: u32,

    /// Height of the image in pixels (multiple of 8)
    #[validate(range(min = 64, max = 2048))]
    pub height: u32,

    /// Filename of the first conditioning image
    #[serde(default)]
    pub control_image_filename_1: Option<String>,

    /// Filename of the second conditioning image
    #[serde(default)]
    pub control_image_filename_2: Option<String>,

    /// Conditioning scale for the first conditioning image
    #[serde(default)]
    #[validate(range(min = 0.0, max = 2.0))]
    pub controlnet_conditioning_scale_1: Option<f64>,

    /// Conditioning scale for the second conditioning image
    #[serde(default)]
    #[validate(range(min = 0.0, max = 2.0))]
    pub controlnet_conditioning_scale_2: Option<f64>,

    /// Guidance end for the first conditioning image
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub control_guidance_end_1: Option<f64>,

    /// Guidance end for the second conditioning image
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub control_guidance_end_2: Option<f64>,

    /// Number of denoising steps
    #[validate(range(min = 1, max = 150))]
    pub num_inference_steps: u32,

    /// Classifier-free guidance scale
    #[validate(range(min = 0.0, max = 30.0))]
    pub guidance_scale: f64,

    /// Random seed for generation
    pub seed: u64,
}

/// The compact projection returned by generation, listing and search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SimpleMetadata {
    /// Filename of the stored image
    pub image_filename: String,
    /// Text prompt the image was generated from
    pub prompt: String,
}

/// Full metadata record as persisted in the relational store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageMetadata {
    pub image_filename: String,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub control_image_filename_1: Option<String>,
    pub control_image_filename_2: Option<String>,
    pub controlnet_conditioning_scale_1: Option<f64>,
    pub controlnet_conditioning_scale_2: Option<f64>,
    pub control_guidance_end_1: Option<f64>,
    pub control_guidance_end_2: Option<f64>,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub seed: u64,
    pub created_at: DateTime<Utc>,
}

/// A metadata record about to be inserted; `created_at` is set by the store.
#[derive(Debug, Clone)]
pub struct NewImageMetadata {
    pub image_filename: String,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub control_image_filename_1: Option<String>,
    pub control_image_filename_2: Option<String>,
    pub controlnet_conditioning_scale_1: Option<f64>,
    pub controlnet_conditioning_scale_2: Option<f64>,
    pub control_guidance_end_1: Option<f64>,
    pub control_guidance_end_2: Option<f64>,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub seed: u64,
}

impl NewImageMetadata {
    pub fn from_request(request: &GenerateImageRequest, image_filename: &str) -> Self {
        Self {
            image_filename: image_filename.to_string(),
            prompt: request.prompt.clone(),
            width: request.width,
            height: request.height,
            control_image_filename_1: request.control_image_filename_1.clone(),
            control_image_filename_2: request.control_image_filename_2.clone(),
            controlnet_conditioning_scale_1: request.controlnet_conditioning_scale_1,
            controlnet_conditioning_scale_2: request.controlnet_conditioning_scale_2,
            control_guidance_end_1: request.control_guidance_end_1,
            control_guidance_end_2: request.control_guidance_end_2,
            num_inference_steps: request.num_inference_steps,
            guidance_scale: request.guidance_scale,
            seed: request.seed,
        }
    }
}

/// The payload stored alongside each point in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointPayload {
    pub image_filename: String,
    pub prompt: String,
}

/// A similarity-search query, assembled from the multipart form.
#[derive(Debug, Clone, Default)]
pub struct SearchImagesQuery {
    /// Query text; takes precedence when an image is also supplied.
    pub text: Option<String>,
    /// Raw bytes of an uploaded query image.
    pub image: Option<Vec<u8>>,
    /// Number of results to return.
    pub topk: Option<u64>,
}

/// Filenames of the images to be deleted.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DeleteImagesRequest {
    #[validate(length(min = 1))]
    pub image_filenames: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeleteStatus {
    Success,
    Partial,
}

/// Outcome of a best-effort delete across all three stores.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteReport {
    pub status: DeleteStatus,
    pub deleted_filenames: Vec<String>,
    pub failed_filenames: Vec<String>,
}
