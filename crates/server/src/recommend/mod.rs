//! Recommendation orchestration.
//!
//! Ties the AI steps to the ranking heuristic:
//!
//! 1. image requests embed the upload and describe it concurrently
//! 2. keywords come from the shopper's text
//! 3. Gemini refines description + text into a query and attributes
//! 4. refinement keywords (or description keywords when refinement failed)
//!    join the set
//! 5. [`rank::rank`] scores the catalog
//!
//! Every AI step is optional and degrades to "no signal" on failure.

pub mod rank;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use moka::future::Cache;
use serde::Serialize;

use crate::ai::gemini::{GeminiClient, Refinement};
use crate::ai::keywords::{extract_all, extract_keywords};
use crate::ai::openai::{NOT_CONFIGURED_DESCRIPTION, OpenAiClient, failure_description};
use crate::ai::vision::{ImageEmbedder, VitEmbedder};
use crate::catalog::{Catalog, ProductView};
use crate::config::AiConfig;

const REFINEMENT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);
const REFINEMENT_CACHE_CAPACITY: u64 = 1_000;

/// JSON body returned by both recommendation routes.
#[derive(Debug, Serialize)]
pub struct Recommendations<'a> {
    /// Ranked products, best first.
    pub products: Vec<ProductView<'a>>,
    /// Keywords used for text matching.
    pub keywords: BTreeSet<String>,
    /// Gemini output or an error marker.
    pub refinement: Refinement,
    /// Vision description (image requests only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_description: Option<String>,
    /// Public URL of the stored upload (image requests only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_image_url: Option<String>,
}

/// An uploaded image ready for recommendation.
#[derive(Debug, Clone)]
pub struct ImageQuery {
    /// Raw file bytes.
    pub bytes: Bytes,
    /// Content type for the vision API.
    pub mime: &'static str,
    /// Optional shopper text sent with the image.
    pub prompt: String,
    /// Public URL of the stored file.
    pub uploaded_image_url: String,
}

/// Description of an uploaded image and whether a model produced it.
struct Description {
    text: String,
    generated: bool,
}

/// Runs the recommendation pipeline.
#[derive(Clone)]
pub struct Recommender {
    embedder: Option<Arc<dyn ImageEmbedder>>,
    openai: Option<OpenAiClient>,
    gemini: Option<GeminiClient>,
    refinements: Cache<(String, String), Refinement>,
}

impl std::fmt::Debug for Recommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommender")
            .field("vision", &self.embedder.is_some())
            .field("openai", &self.openai)
            .field("gemini", &self.gemini)
            .finish_non_exhaustive()
    }
}

impl Recommender {
    /// Create a recommender from already-built parts.
    #[must_use]
    pub fn new(
        embedder: Option<Arc<dyn ImageEmbedder>>,
        openai: Option<OpenAiClient>,
        gemini: Option<GeminiClient>,
    ) -> Self {
        let refinements = Cache::builder()
            .max_capacity(REFINEMENT_CACHE_CAPACITY)
            .time_to_live(REFINEMENT_CACHE_TTL)
            .build();

        Self {
            embedder,
            openai,
            gemini,
            refinements,
        }
    }

    /// Build every configured component, logging and skipping the ones that fail.
    #[must_use]
    pub fn from_config(config: &AiConfig) -> Self {
        let embedder = config.vit_model_path.as_deref().and_then(|path| {
            VitEmbedder::load(path)
                .map(|e| Arc::new(e) as Arc<dyn ImageEmbedder>)
                .map_err(|e| {
                    tracing::error!(error = %e, path = %path.display(), "ViT model failed to load, visual search disabled");
                })
                .ok()
        });
        if config.vit_model_path.is_none() {
            tracing::warn!("SHOPSMARTER_VIT_MODEL_PATH not set, visual search disabled");
        }

        let openai = config.openai.as_ref().and_then(|c| {
            OpenAiClient::new(c)
                .map_err(|e| tracing::error!(error = %e, "OpenAI client unavailable"))
                .ok()
        });
        if config.openai.is_none() {
            tracing::warn!("OPENAI_API_KEY not set, image descriptions disabled");
        }

        let gemini = config.gemini.as_ref().and_then(|c| {
            GeminiClient::new(c)
                .map_err(|e| tracing::error!(error = %e, "Gemini client unavailable"))
                .ok()
        });
        if config.gemini.is_none() {
            tracing::warn!("GOOGLE_API_KEY not set, search refinement disabled");
        }

        Self::new(embedder, openai, gemini)
    }

    /// The image embedder, if a model is loaded.
    #[must_use]
    pub fn embedder(&self) -> Option<Arc<dyn ImageEmbedder>> {
        self.embedder.clone()
    }

    /// Recommend products for a text prompt.
    pub async fn recommend_for_text<'a>(
        &self,
        catalog: &'a Catalog,
        prompt: &str,
        top_k: usize,
    ) -> Recommendations<'a> {
        let refinement = self.refine("", prompt).await;

        let mut keywords = extract_keywords(prompt);
        keywords.extend(extract_all(refinement.search_texts()));

        let products = rank::rank(catalog.products(), None, &keywords, top_k)
            .into_iter()
            .map(|r| r.product.view())
            .collect();

        Recommendations {
            products,
            keywords,
            refinement,
            image_description: None,
            uploaded_image_url: None,
        }
    }

    /// Recommend products for an uploaded image and optional prompt.
    pub async fn recommend_for_image<'a>(
        &self,
        catalog: &'a Catalog,
        query: ImageQuery,
        top_k: usize,
    ) -> Recommendations<'a> {
        let (embedding, description) = tokio::join!(
            self.embed(query.bytes.clone()),
            self.describe(&query.bytes, query.mime)
        );

        let model_description = if description.generated {
            description.text.as_str()
        } else {
            ""
        };
        let refinement = self.refine(model_description, &query.prompt).await;

        let mut keywords = extract_keywords(&query.prompt);
        if refinement.is_refined() {
            keywords.extend(extract_all(refinement.search_texts()));
        } else {
            keywords.extend(extract_keywords(model_description));
        }

        tracing::info!(
            has_embedding = embedding.is_some(),
            described = description.generated,
            refined = refinement.is_refined(),
            keyword_count = keywords.len(),
            "Ranking image query"
        );

        let products = rank::rank(catalog.products(), embedding.as_deref(), &keywords, top_k)
            .into_iter()
            .map(|r| r.product.view())
            .collect();

        Recommendations {
            products,
            keywords,
            refinement,
            image_description: Some(description.text),
            uploaded_image_url: Some(query.uploaded_image_url),
        }
    }

    /// Embed on the blocking pool.
    async fn embed(&self, bytes: Bytes) -> Option<Vec<f32>> {
        let embedder = self.embedder.clone()?;
        match tokio::task::spawn_blocking(move || embedder.embed_bytes(&bytes)).await {
            Ok(Ok(embedding)) => Some(embedding),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Image embedding failed");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Image embedding task panicked");
                None
            }
        }
    }

    async fn describe(&self, bytes: &[u8], mime: &str) -> Description {
        match &self.openai {
            Some(client) => match client.describe_image(bytes, mime).await {
                Ok(text) => Description {
                    text,
                    generated: true,
                },
                Err(e) => Description {
                    text: failure_description(&e),
                    generated: false,
                },
            },
            None => Description {
                text: NOT_CONFIGURED_DESCRIPTION.to_string(),
                generated: false,
            },
        }
    }

    /// Refine through Gemini, caching successful answers.
    async fn refine(&self, description: &str, prompt: &str) -> Refinement {
        let Some(gemini) = &self.gemini else {
            return Refinement::not_configured();
        };
        if description.trim().is_empty() && prompt.trim().is_empty() {
            return Refinement::Failed {
                error: "Nothing to refine.".to_string(),
            };
        }

        let key = (description.to_string(), prompt.to_string());
        if let Some(cached) = self.refinements.get(&key).await {
            tracing::debug!("Refinement cache hit");
            return cached;
        }

        let refinement = gemini.refine(description, prompt).await;
        if refinement.is_refined() {
            self.refinements.insert(key, refinement.clone()).await;
        }
        refinement
    }
}
