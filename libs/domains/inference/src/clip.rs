use candle::{DType, Device, Tensor, D};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use image::DynamicImage;
use tokenizers::Tokenizer;

use crate::backend::ImageEncoder;
use crate::device::select_device;
use crate::error::{InferenceError, InferenceResult};

/// CLIP encoder configuration
#[derive(Debug, Clone)]
pub struct ClipSettings {
    pub model_repo: String,
    pub revision: String,
    pub force_cpu: bool,
}

impl ClipSettings {
    pub fn from_env() -> Self {
        let model_repo = std::env::var("CLIP_MODEL_REPO")
            .unwrap_or_else(|_| "openai/clip-vit-base-patch32".to_string());

        // The safetensors conversion of the patch32 weights lives on this
        // revision upstream.
        let revision =
            std::env::var("CLIP_MODEL_REVISION").unwrap_or_else(|_| "refs/pr/15".to_string());

        let force_cpu = std::env::var("INFERENCE_DEVICE")
            .map(|v| v.eq_ignore_ascii_case("cpu"))
            .unwrap_or(false);

        Self {
            model_repo,
            revision,
            force_cpu,
        }
    }
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            model_repo: "openai/clip-vit-base-patch32".to_string(),
            revision: "refs/pr/15".to_string(),
            force_cpu: false,
        }
    }
}

/// CLIP-backed implementation of [`ImageEncoder`].
///
/// Downloads the model weights and tokenizer through hf-hub on first load
/// and keeps everything resident for the lifetime of the process.
pub struct ClipEncoder {
    model: ClipModel,
    tokenizer: Tokenizer,
    config: ClipConfig,
    device: Device,
}

impl ClipEncoder {
    pub fn load(settings: &ClipSettings) -> InferenceResult<Self> {
        let api = Api::new().map_err(|e| InferenceError::ModelLoad(e.to_string()))?;
        let repo = api.repo(Repo::with_revision(
            settings.model_repo.clone(),
            RepoType::Model,
            settings.revision.clone(),
        ));

        let model_file = repo
            .get("model.safetensors")
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?;
        let tokenizer_file = repo
            .get("tokenizer.json")
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?;

        let tokenizer =
            Tokenizer::from_file(tokenizer_file).map_err(|e| InferenceError::Tokenizer(e.to_string()))?;

        let device = select_device(settings.force_cpu)?;
        let config = ClipConfig::vit_base_patch32();

        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[model_file], DType::F32, &device)? };
        let model = ClipModel::new(vb, &config)?;

        tracing::info!(repo = %settings.model_repo, "Loaded CLIP encoder");

        Ok(Self {
            model,
            tokenizer,
            config,
            device,
        })
    }

    fn preprocess(&self, image: &DynamicImage) -> InferenceResult<Tensor> {
        let size = self.config.image_size;
        let img = image
            .resize_to_fill(size as u32, size as u32, image::imageops::FilterType::Triangle)
            .to_rgb8();
        let raw = img.into_raw();
        let tensor = Tensor::from_vec(raw, (size, size, 3), &Device::Cpu)?
            .permute((2, 0, 1))?
            .to_dtype(DType::F32)?
            .affine(2. / 255., -1.)?;
        Ok(tensor)
    }
}

impl ImageEncoder for ClipEncoder {
    fn encode_image(&self, image: &DynamicImage) -> InferenceResult<Vec<f32>> {
        let pixel_values = self.preprocess(image)?.unsqueeze(0)?.to_device(&self.device)?;
        let features = self.model.get_image_features(&pixel_values)?;
        let features = div_l2_norm(&features)?;
        Ok(features.flatten_all()?.to_vec1::<f32>()?)
    }

    fn encode_text(&self, text: &str) -> InferenceResult<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;
        let input_ids = Tensor::new(vec![encoding.get_ids().to_vec()], &self.device)?;
        let features = self.model.get_text_features(&input_ids)?;
        let features = div_l2_norm(&features)?;
        Ok(features.flatten_all()?.to_vec1::<f32>()?)
    }

    fn dimension(&self) -> usize {
        self.config.text_config.projection_dim
    }
}

fn div_l2_norm(v: &Tensor) -> candle::Result<Tensor> {
    let l2_norm = v.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?;
    v.broadcast_div(&l2_norm)
}
