//! `OpenAI` vision descriptions.
//!
//! Uploaded images are sent inline as a base64 data URI to the chat
//! completions endpoint with an apparel-focused instruction.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use super::AiError;
use crate::config::HostedModelConfig;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_TOKENS: u32 = 300;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Instruction sent alongside every image.
pub const DESCRIBE_PROMPT: &str = "Describe this image focusing on apparel, accessories, style, colors, patterns, and material. Provide a concise but detailed summary useful for e-commerce search.";

/// Description used when no `OpenAI` key is configured.
pub const NOT_CONFIGURED_DESCRIPTION: &str =
    "Image description not available (OpenAI client not configured).";

/// Client for image descriptions via the chat completions API.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `AiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &HostedModelConfig) -> Result<Self, AiError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    /// Describe an image.
    ///
    /// # Arguments
    ///
    /// * `image` - Raw file bytes
    /// * `mime` - Content type used in the data URI (e.g. `image/png`)
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API answers with an error
    /// status, or the response has no message content.
    #[instrument(skip(self, image), fields(model = %self.model, image_bytes = image.len()))]
    pub async fn describe_image(&self, image: &[u8], mime: &str) -> Result<String, AiError> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": DESCRIBE_PROMPT },
                    { "type": "image_url", "image_url": { "url": data_uri(image, mime) } },
                ],
            }],
        });

        let response = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AiError::from_response(response).await);
        }

        let response: ChatCompletionResponse = response.json().await?;
        let description = response.content().ok_or_else(|| {
            AiError::InvalidResponse("OpenAI response contained no message content".to_string())
        })?;

        tracing::info!(chars = description.len(), "Image description generated");
        Ok(description)
    }
}

/// Readable description of a failed vision call, shown in place of a description.
#[must_use]
pub fn failure_description(error: &AiError) -> String {
    match error {
        AiError::Api { status, message } => {
            tracing::error!(status, %message, "OpenAI API error");
            format!("Error from OpenAI API: {}", api_error_message(message))
        }
        other => {
            tracing::error!(error = %other, "OpenAI vision call failed");
            format!("Error getting image description: {other}")
        }
    }
}

/// `data:<mime>;base64,<payload>`
fn data_uri(image: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(image))
}

/// Pull `error.message` out of an `OpenAI` error body, falling back to the body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatCompletionResponse {
    fn content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()?
            .message
            .content
            .filter(|c| !c.trim().is_empty())
    }
}
