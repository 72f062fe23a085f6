pub mod gemini_service;
pub mod prompt;
pub mod report;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Vision model API key is not configured")]
    NotConfigured,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Vision model returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Vision model blocked the request: {0}")]
    Blocked(String),
    #[error("Vision model returned no text")]
    EmptyResponse,
}

/// Image bytes plus the MIME type the remote model should be told about.
#[derive(Debug, Clone, Copy)]
pub struct ImageInput<'a> {
    pub mime_type: &'a str,
    pub data: &'a [u8],
}

/// A generative model that answers a text prompt about an image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(&self, prompt: &str, image: ImageInput<'_>) -> Result<String, VisionError>;
}
