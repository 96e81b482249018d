use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Failed to load model weights: {0}")]
    ModelLoad(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Prompt is too long: {len} tokens > max {max}")]
    PromptTooLong { len: usize, max: usize },

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Internal inference error: {0}")]
    Internal(String),
}

pub type InferenceResult<T> = Result<T, InferenceError>;
