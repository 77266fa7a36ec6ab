//! Gemini search refinement.
//!
//! Sends the image description and the shopper's text to Gemini's
//! `generateContent` endpoint and asks for a JSON object with a refined
//! search query and a handful of searchable attributes.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use super::AiError;
use crate::config::HostedModelConfig;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a refinement attempt, serialized as-is into API responses.
///
/// Failures are values rather than errors: a recommendation request still
/// succeeds when refinement does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Refinement {
    /// Gemini returned the expected JSON object.
    Refined {
        /// Optimized search query (up to ten words).
        refined_search_query: String,
        /// Three to five searchable attributes.
        key_attributes: Vec<String>,
    },
    /// Gemini answered, but not with the expected JSON.
    Unparsed {
        /// The model's text, untouched.
        raw_text: String,
        /// What went wrong.
        error: String,
    },
    /// Refinement was skipped or the call failed.
    Failed {
        /// What went wrong.
        error: String,
    },
}

impl Refinement {
    /// Marker returned when no Gemini key is configured.
    #[must_use]
    pub fn not_configured() -> Self {
        Self::Failed {
            error: "Gemini API key not configured.".to_string(),
        }
    }

    /// Whether a usable refinement came back.
    #[must_use]
    pub const fn is_refined(&self) -> bool {
        matches!(self, Self::Refined { .. })
    }

    /// The query and attribute texts to mine for keywords.
    #[must_use]
    pub fn search_texts(&self) -> Vec<&str> {
        match self {
            Self::Refined {
                refined_search_query,
                key_attributes,
            } => std::iter::once(refined_search_query.as_str())
                .chain(key_attributes.iter().map(String::as_str))
                .collect(),
            Self::Unparsed { .. } | Self::Failed { .. } => Vec::new(),
        }
    }
}

/// Expected shape of the model's JSON answer.
#[derive(Deserialize)]
struct RefinementPayload {
    refined_search_query: String,
    #[serde(default)]
    key_attributes: Vec<String>,
}

/// Parse the model's text into a [`Refinement`], tolerating code fences.
#[must_use]
pub fn parse_refinement(raw_text: &str) -> Refinement {
    let cleaned = strip_code_fence(raw_text);

    match serde_json::from_str::<RefinementPayload>(cleaned) {
        Ok(payload) => Refinement::Refined {
            refined_search_query: payload.refined_search_query.trim().to_string(),
            key_attributes: payload
                .key_attributes
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
        },
        Err(e) => {
            tracing::warn!(error = %e, raw_text, "Gemini response was not valid JSON");
            Refinement::Unparsed {
                raw_text: raw_text.to_string(),
                error: "Gemini response was not valid JSON.".to_string(),
            }
        }
    }
}

/// Remove a surrounding Markdown code fence (```` ```json ... ``` ````).
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Build the instruction prompt sent to Gemini.
#[must_use]
pub fn build_prompt(image_description: &str, user_prompt: &str) -> String {
    format!(
        r#"You are an intelligent e-commerce search assistant.
Based on the following information, generate a structured JSON response to help find a product.

- Image Description (from Vision AI): "{image_description}"
- User's Text Query: "{user_prompt}"

Your task is to provide a JSON object with ONLY the following keys:
1. "refined_search_query": A single, optimized search query string (max 10 words) for an e-commerce site.
2. "key_attributes": A list of 3-5 specific, searchable attributes (e.g., "red floral dress", "leather ankle boots").

Example JSON output:
{{
  "refined_search_query": "long sleeve vintage floral midi dress",
  "key_attributes": ["vintage floral print", "midi dress", "long sleeve", "bohemian style"]
}}

If the input is vague, make the attributes broader. Output ONLY the JSON object."#
    )
}

/// Client for the Gemini `generateContent` API.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a new Gemini client.
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

    /// Ask Gemini to refine a search and return the model's raw text.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API answers with an error
    /// status, or the response carries no text.
    #[instrument(skip_all, fields(model = %self.model))]
    pub async fn generate(
        &self,
        image_description: &str,
        user_prompt: &str,
    ) -> Result<String, AiError> {
        let body = json!({
            "contents": [{
                "parts": [{ "text": build_prompt(image_description, user_prompt) }]
            }]
        });

        let response = self
            .client
            .post(format!("{GEMINI_API_BASE}/{}:generateContent", self.model))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AiError::from_response(response).await);
        }

        let response: GenerateContentResponse = response.json().await?;
        response.text().ok_or_else(|| {
            AiError::InvalidResponse("Gemini response contained no text".to_string())
        })
    }

    /// Refine a search, folding every failure into the returned value.
    pub async fn refine(&self, image_description: &str, user_prompt: &str) -> Refinement {
        match self.generate(image_description, user_prompt).await {
            Ok(text) => parse_refinement(&text),
            Err(e) => {
                tracing::error!(error = %e, "Gemini refinement failed");
                Refinement::Failed {
                    error: format!("Error interacting with Gemini: {e}"),
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let refinement = parse_refinement(
            r#"{"refined_search_query": "red floral midi dress", "key_attributes": ["red floral print", " midi dress ", ""]}"#,
        );
        assert_eq!(
            refinement,
            Refinement::Refined {
                refined_search_query: "red floral midi dress".to_string(),
                key_attributes: vec!["red floral print".to_string(), "midi dress".to_string()],
            }
        );
        assert_eq!(
            refinement.search_texts(),
            vec!["red floral midi dress", "red floral print", "midi dress"]
        );
    }

    #[test]
    fn test_parse_strips_code_fences() {
        let raw = "```json\n{\"refined_search_query\": \"leather boots\", \"key_attributes\": [\"ankle boots\"]}\n```";
        assert!(parse_refinement(raw).is_refined());

        let bare_fence = "```\n{\"refined_search_query\": \"boots\"}\n```";
        assert!(parse_refinement(bare_fence).is_refined());
    }

    #[test]
    fn test_parse_malformed_json() {
        let refinement = parse_refinement("Sure! Here are some ideas: red dress");
        assert_eq!(
            refinement,
            Refinement::Unparsed {
                raw_text: "Sure! Here are some ideas: red dress".to_string(),
                error: "Gemini response was not valid JSON.".to_string(),
            }
        );
        assert!(refinement.search_texts().is_empty());
    }

    #[test]
    fn test_serialized_shapes() {
        let failed = serde_json::to_value(Refinement::not_configured()).expect("serialize");
        assert_eq!(failed, json!({"error": "Gemini API key not configured."}));

        let unparsed = serde_json::to_value(parse_refinement("nope")).expect("serialize");
        assert_eq!(unparsed["raw_text"], "nope");
        assert!(unparsed["error"].is_string());
    }

    #[test]
    fn test_prompt_mentions_inputs() {
        let prompt = build_prompt("a blue denim jacket", "something warmer");
        assert!(prompt.contains("\"a blue denim jacket\""));
        assert!(prompt.contains("\"something warmer\""));
        assert!(prompt.contains("\"refined_search_query\""));
    }

    #[test]
    fn test_generate_content_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]
        }))
        .expect("deserialize");
        assert_eq!(response.text().as_deref(), Some("{\"a\":1}"));

        let empty: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": []})).expect("deserialize");
        assert!(empty.text().is_none());
    }
}
