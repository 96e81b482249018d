use candle::{DType, Device, IndexOp, Module, Tensor};
use candle_transformers::models::stable_diffusion::{
    self, clip::ClipTextTransformer, unet_2d::UNet2DConditionModel, vae::AutoEncoderKL,
    StableDiffusionConfig,
};
use hf_hub::api::sync::Api;
use image::{DynamicImage, RgbImage};
use tokenizers::Tokenizer;

use crate::backend::ImageGenerator;
use crate::device::select_device;
use crate::error::{InferenceError, InferenceResult};
use crate::models::{ControlInput, GenerationRequest};

/// Latent scale factor for the v1.5 autoencoder.
const VAE_SCALE: f64 = 0.18215;

/// Diffusion pipeline configuration
#[derive(Debug, Clone)]
pub struct DiffusionSettings {
    /// Hub repo holding the UNet/VAE/text-encoder weights.
    pub model_repo: String,
    /// Hub repo holding the CLIP tokenizer.
    pub tokenizer_repo: String,
    pub use_f16: bool,
    pub force_cpu: bool,
}

impl DiffusionSettings {
    pub fn from_env() -> Self {
        let model_repo = std::env::var("SD_MODEL_REPO")
            .unwrap_or_else(|_| "runwayml/stable-diffusion-v1-5".to_string());

        let tokenizer_repo = std::env::var("SD_TOKENIZER_REPO")
            .unwrap_or_else(|_| "openai/clip-vit-base-patch32".to_string());

        let use_f16 = std::env::var("SD_USE_F16")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let force_cpu = std::env::var("INFERENCE_DEVICE")
            .map(|v| v.eq_ignore_ascii_case("cpu"))
            .unwrap_or(false);

        Self {
            model_repo,
            tokenizer_repo,
            use_f16,
            force_cpu,
        }
    }
}

impl Default for DiffusionSettings {
    fn default() -> Self {
        Self {
            model_repo: "runwayml/stable-diffusion-v1-5".to_string(),
            tokenizer_repo: "openai/clip-vit-base-patch32".to_string(),
            use_f16: false,
            force_cpu: false,
        }
    }
}

/// Stable-Diffusion-backed implementation of [`ImageGenerator`].
///
/// Weights (text encoder, UNet, VAE) and the tokenizer are fetched through
/// hf-hub at load time and stay resident. Each call builds a fresh scheduler
/// for the requested step count, so concurrent generations do not share
/// mutable state.
///
/// Conditioning images are not fed through a ControlNet (no port exists in
/// the model library); instead each one is VAE-encoded and its latent is
/// re-noised and blended into the denoising state with weight
/// `conditioning_scale` for the first `guidance_end` fraction of the
/// schedule. A scale of 0.0 is an exact no-op.
pub struct SdPipeline {
    device: Device,
    dtype: DType,
    sd_config: StableDiffusionConfig,
    tokenizer: Tokenizer,
    text_model: ClipTextTransformer,
    unet: UNet2DConditionModel,
    vae: AutoEncoderKL,
}

struct ControlLatent {
    latent: Tensor,
    weight: f64,
    /// Number of leading scheduler steps during which the latent is imposed.
    active_steps: usize,
}

impl SdPipeline {
    pub fn load(settings: &DiffusionSettings) -> InferenceResult<Self> {
        let api = Api::new().map_err(|e| InferenceError::ModelLoad(e.to_string()))?;
        let get = |repo: &str, path: &str| {
            api.model(repo.to_string())
                .get(path)
                .map_err(|e| InferenceError::ModelLoad(e.to_string()))
        };

        let tokenizer_file = get(&settings.tokenizer_repo, "tokenizer.json")?;
        let (clip_weights, unet_weights, vae_weights) = if settings.use_f16 {
            (
                get(&settings.model_repo, "text_encoder/model.fp16.safetensors")?,
                get(&settings.model_repo, "unet/diffusion_pytorch_model.fp16.safetensors")?,
                get(&settings.model_repo, "vae/diffusion_pytorch_model.fp16.safetensors")?,
            )
        } else {
            (
                get(&settings.model_repo, "text_encoder/model.safetensors")?,
                get(&settings.model_repo, "unet/diffusion_pytorch_model.safetensors")?,
                get(&settings.model_repo, "vae/diffusion_pytorch_model.safetensors")?,
            )
        };

        let device = select_device(settings.force_cpu)?;
        let dtype = if settings.use_f16 { DType::F16 } else { DType::F32 };
        let sd_config = StableDiffusionConfig::v1_5(None, None, None);

        let tokenizer = Tokenizer::from_file(tokenizer_file)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;

        // The text encoder always runs in f32, matching the reference setup.
        let text_model = stable_diffusion::build_clip_transformer(
            &sd_config.clip,
            clip_weights,
            &device,
            DType::F32,
        )?;
        let unet = sd_config.build_unet(unet_weights, &device, 4, false, dtype)?;
        let vae = sd_config.build_vae(vae_weights, &device, dtype)?;

        tracing::info!(repo = %settings.model_repo, "Loaded diffusion pipeline");

        Ok(Self {
            device,
            dtype,
            sd_config,
            tokenizer,
            text_model,
            unet,
            vae,
        })
    }

    fn encode_prompt(&self, prompt: &str) -> InferenceResult<Tensor> {
        let pad_id = match &self.sd_config.clip.pad_with {
            Some(padding) => self.tokenizer.get_vocab(true).get(padding.as_str()).copied(),
            None => self.tokenizer.get_vocab(true).get("<|endoftext|>").copied(),
        }
        .ok_or_else(|| InferenceError::Tokenizer("tokenizer has no pad token".to_string()))?;

        let mut tokens = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?
            .get_ids()
            .to_vec();

        let max = self.sd_config.clip.max_position_embeddings;
        if tokens.len() > max {
            return Err(InferenceError::PromptTooLong {
                len: tokens.len(),
                max,
            });
        }
        while tokens.len() < max {
            tokens.push(pad_id)
        }

        let tokens = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
        Ok(self.text_model.forward(&tokens)?)
    }

    /// Build the (optionally classifier-free-guidance doubled) text embedding.
    fn text_embeddings(&self, prompt: &str, use_guide_scale: bool) -> InferenceResult<Tensor> {
        let text_embeddings = self.encode_prompt(prompt)?;

        let text_embeddings = if use_guide_scale {
            let uncond_embeddings = self.encode_prompt("")?;
            Tensor::cat(&[uncond_embeddings, text_embeddings], 0)?.to_dtype(self.dtype)?
        } else {
            text_embeddings.to_dtype(self.dtype)?
        };
        Ok(text_embeddings)
    }

    fn encode_control(
        &self,
        control: &ControlInput,
        width: usize,
        height: usize,
        total_steps: usize,
    ) -> InferenceResult<ControlLatent> {
        let img = preprocess_image(&control.image, width, height)?
            .to_device(&self.device)?
            .to_dtype(self.dtype)?;

        let latent = (self.vae.encode(&img)?.sample()? * VAE_SCALE)?;

        let weight = control.conditioning_scale.clamp(0.0, 1.0);
        let guidance_end = control.guidance_end.clamp(0.0, 1.0);
        let active_steps = (guidance_end * total_steps as f64).ceil() as usize;

        Ok(ControlLatent {
            latent,
            weight,
            active_steps,
        })
    }
}

impl ImageGenerator for SdPipeline {
    fn generate(&self, request: &GenerationRequest) -> InferenceResult<RgbImage> {
        let width = request.width as usize;
        let height = request.height as usize;
        let use_guide_scale = request.guidance_scale > 1.0;

        self.device.set_seed(request.seed)?;

        let text_embeddings = self.text_embeddings(&request.prompt, use_guide_scale)?;
        let mut scheduler = self.sd_config.build_scheduler(request.num_inference_steps)?;
        let timesteps = scheduler.timesteps().to_vec();

        let control_latents = request
            .control
            .iter()
            .map(|c| self.encode_control(c, width, height, timesteps.len()))
            .collect::<InferenceResult<Vec<_>>>()?;

        let latents = Tensor::randn(0f32, 1f32, (1, 4, height / 8, width / 8), &self.device)?;
        // Scale the initial noise by the standard deviation required by the scheduler
        let mut latents = (latents * scheduler.init_noise_sigma())?.to_dtype(self.dtype)?;

        for (timestep_index, &timestep) in timesteps.iter().enumerate() {
            let latent_model_input = if use_guide_scale {
                Tensor::cat(&[&latents, &latents], 0)?
            } else {
                latents.clone()
            };
            let latent_model_input = scheduler.scale_model_input(latent_model_input, timestep)?;

            let noise_pred =
                self.unet
                    .forward(&latent_model_input, timestep as f64, &text_embeddings)?;

            let noise_pred = if use_guide_scale {
                let noise_pred = noise_pred.chunk(2, 0)?;
                let (noise_pred_uncond, noise_pred_text) = (&noise_pred[0], &noise_pred[1]);

                (noise_pred_uncond
                    + ((noise_pred_text - noise_pred_uncond)? * request.guidance_scale)?)?
            } else {
                noise_pred
            };

            latents = scheduler.step(&noise_pred, timestep, &latents)?;

            // Impose each conditioning latent, re-noised to the level of the
            // next step, while its schedule window is open.
            if timestep_index + 1 < timesteps.len() {
                let next_timestep = timesteps[timestep_index + 1];
                for control in &control_latents {
                    if control.weight <= 0.0 || timestep_index + 1 >= control.active_steps {
                        continue;
                    }
                    let noise = control.latent.randn_like(0f64, 1f64)?;
                    let noised = scheduler.add_noise(&control.latent, noise, next_timestep)?;
                    let kept = (&latents * (1.0 - control.weight))?;
                    latents = (kept + (noised * control.weight)?)?;
                }
            }
        }

        let image = self.vae.decode(&(latents / VAE_SCALE)?)?;
        let image = ((image / 2.)? + 0.5)?.to_device(&Device::Cpu)?;
        let image = (image.clamp(0f32, 1.)? * 255.)?.to_dtype(DType::U8)?;
        tensor_to_image(&image.i(0)?)
    }
}

/// Resize and normalize an image to the `[-1, 1]` NCHW tensor the VAE expects.
fn preprocess_image(
    image: &DynamicImage,
    width: usize,
    height: usize,
) -> InferenceResult<Tensor> {
    let img = image
        .resize_to_fill(
            width as u32,
            height as u32,
            image::imageops::FilterType::CatmullRom,
        )
        .to_rgb8();
    let raw = img.into_raw();
    let tensor = Tensor::from_vec(raw, (height, width, 3), &Device::Cpu)?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?
        .affine(2. / 255., -1.)?
        .unsqueeze(0)?;
    Ok(tensor)
}

/// Convert a `(3, height, width)` u8 tensor into an [`RgbImage`].
fn tensor_to_image(tensor: &Tensor) -> InferenceResult<RgbImage> {
    let (channels, height, width) = tensor.dims3()?;
    if channels != 3 {
        return Err(InferenceError::Internal(format!(
            "expected 3 channels, got {channels}"
        )));
    }
    let pixels = tensor.permute((1, 2, 0))?.flatten_all()?.to_vec1::<u8>()?;
    RgbImage::from_raw(width as u32, height as u32, pixels)
        .ok_or_else(|| InferenceError::Internal("image buffer size mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn preprocess_produces_nchw_in_unit_range() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([255, 255, 255])));
        let tensor = preprocess_image(&white, 64, 32).unwrap();
        assert_eq!(tensor.dims(), [1, 3, 32, 64]);

        let max = tensor
            .flatten_all()
            .unwrap()
            .max(0)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!((max - 1.0).abs() < 1e-5);
    }

    #[test]
    fn tensor_roundtrips_to_image() {
        let tensor = Tensor::zeros((3, 8, 16), DType::U8, &Device::Cpu).unwrap();
        let image = tensor_to_image(&tensor).unwrap();
        assert_eq!(image.dimensions(), (16, 8));
    }

    #[test]
    fn non_rgb_tensor_is_rejected() {
        let tensor = Tensor::zeros((4, 8, 8), DType::U8, &Device::Cpu).unwrap();
        assert!(tensor_to_image(&tensor).is_err());
    }
}
