use image::DynamicImage;

/// A single conditioning input: an image plus the weight and schedule that
/// bound its influence on the diffusion process.
#[derive(Debug, Clone)]
pub struct ControlInput {
    pub image: DynamicImage,
    /// Blend weight for the conditioning latent, 0.0 (no influence) to 1.0.
    pub conditioning_scale: f64,
    /// Fraction of the denoising schedule during which the conditioning
    /// latent is imposed, 0.0..=1.0.
    pub guidance_end: f64,
}

/// Fully-resolved parameters for one image generation.
///
/// Conditioning inputs arrive already validated and resolved by the caller;
/// the pipeline applies them as given.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub control: Vec<ControlInput>,
    pub num_inference_steps: usize,
    pub guidance_scale: f64,
    pub seed: u64,
}
