//! Model inference and hosted AI API clients.
//!
//! - [`vision`] - ViT image embeddings through ONNX Runtime
//! - [`openai`] - Apparel-focused image descriptions from `OpenAI`
//! - [`gemini`] - Search query refinement from Gemini
//! - [`keywords`] - Local keyword extraction with tantivy's analyzers

pub mod gemini;
pub mod keywords;
pub mod openai;
pub mod vision;

use thiserror::Error;

/// Errors that can occur in the AI layer.
#[derive(Debug, Error)]
pub enum AiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Hosted API returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or error message.
        message: String,
    },

    /// Response did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Image could not be read or decoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// File read failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// ONNX Runtime failed to load or run the model.
    #[error("model error: {0}")]
    Model(String),
}

impl AiError {
    /// Build an `Api` error from a failed response, consuming its body.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Self::Api { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_error_display() {
        let err = AiError::Api {
            status: 429,
            message: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "API error (429): quota exceeded");
        assert_eq!(
            AiError::Model("no session".into()).to_string(),
            "model error: no session"
        );
    }
}
