//! Inference Domain Library
//!
//! Generation and embedding backends for the image service. The heavy
//! lifting is delegated to pretrained models driven through candle; this
//! crate only wires weights, tokenizers and tensors together behind two
//! narrow traits:
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────┐
//! │  ImageGenerator  │      │   ImageEncoder   │
//! │     (trait)      │      │     (trait)      │
//! └────────┬─────────┘      └────────┬─────────┘
//!          │                         │
//! ┌────────▼─────────┐      ┌────────▼─────────┐
//! │    SdPipeline    │      │   ClipEncoder    │
//! │ (stable diffusion│      │ (clip-vit-base-  │
//! │  v1.5 weights)   │      │  patch32 weights)│
//! └──────────────────┘      └──────────────────┘
//! ```
//!
//! Both backends are synchronous and compute-bound; callers are expected to
//! run them on a blocking thread.

pub mod backend;
pub mod clip;
pub mod device;
pub mod diffusion;
pub mod error;
pub mod models;

pub use backend::{ImageEncoder, ImageGenerator};
pub use clip::{ClipEncoder, ClipSettings};
pub use device::select_device;
pub use diffusion::{DiffusionSettings, SdPipeline};
pub use error::{InferenceError, InferenceResult};
pub use models::{ControlInput, GenerationRequest};
