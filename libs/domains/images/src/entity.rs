use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

/// Sea-ORM entity for the image_metadata table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "image_metadata")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub image_filename: String,
    #[sea_orm(column_type = "Text")]
    pub prompt: String,
    pub width: i32,
    pub height: i32,

    // Conditioning image slots and their parameters (at most two)
    pub control_image_filename_1: Option<String>,
    pub control_image_filename_2: Option<String>,
    pub controlnet_conditioning_scale_1: Option<f64>,
    pub controlnet_conditioning_scale_2: Option<f64>,
    pub control_guidance_end_1: Option<f64>,
    pub control_guidance_end_2: Option<f64>,

    pub num_inference_steps: i32,
    pub guidance_scale: f64,
    pub seed: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

// Conversion from Sea-ORM Model to the domain record
impl From<Model> for crate::models::ImageMetadata {
    fn from(model: Model) -> Self {
        Self {
            image_filename: model.image_filename,
            prompt: model.prompt,
            width: model.width as u32,
            height: model.height as u32,
            control_image_filename_1: model.control_image_filename_1,
            control_image_filename_2: model.control_image_filename_2,
            controlnet_conditioning_scale_1: model.controlnet_conditioning_scale_1,
            controlnet_conditioning_scale_2: model.controlnet_conditioning_scale_2,
            control_guidance_end_1: model.control_guidance_end_1,
            control_guidance_end_2: model.control_guidance_end_2,
            num_inference_steps: model.num_inference_steps as u32,
            guidance_scale: model.guidance_scale,
            seed: model.seed as u64,
            created_at: model.created_at.into(),
        }
    }
}

// Conversion from the insert DTO to a Sea-ORM ActiveModel
impl From<crate::models::NewImageMetadata> for ActiveModel {
    fn from(input: crate::models::NewImageMetadata) -> Self {
        ActiveModel {
            image_filename: Set(input.image_filename),
            prompt: Set(input.prompt),
            width: Set(input.width as i32),
            height: Set(input.height as i32),
            control_image_filename_1: Set(input.control_image_filename_1),
            control_image_filename_2: Set(input.control_image_filename_2),
            controlnet_conditioning_scale_1: Set(input.controlnet_conditioning_scale_1),
            controlnet_conditioning_scale_2: Set(input.controlnet_conditioning_scale_2),
            control_guidance_end_1: Set(input.control_guidance_end_1),
            control_guidance_end_2: Set(input.control_guidance_end_2),
            num_inference_steps: Set(input.num_inference_steps as i32),
            guidance_scale: Set(input.guidance_scale),
            seed: Set(input.seed as i64),
            created_at: Set(chrono::Utc::now().into()),
        }
    }
}
