//! Precompute catalog embeddings.
//!
//! # Usage
//!
//! ```bash
//! # Fill in missing embeddings using SHOPSMARTER_VIT_MODEL_PATH
//! shopsmarter-cli embed-catalog
//!
//! # Recompute every embedding with an explicit model
//! shopsmarter-cli embed-catalog --model models/vit.onnx --force
//! ```
//!
//! Embeddings written to the catalog file are used as-is by the server, so
//! startup skips inference for those products.

use std::path::{Path, PathBuf};

use thiserror::Error;

use shopsmarter_server::ai::AiError;
use shopsmarter_server::ai::vision::{ImageEmbedder, VitEmbedder};
use shopsmarter_server::catalog::{CatalogError, embed_missing, read_products, write_products};

/// Errors that can occur while embedding the catalog.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// No model path given on the command line or in the environment.
    #[error("No ViT model path: pass --model or set SHOPSMARTER_VIT_MODEL_PATH")]
    MissingModel,

    /// The ONNX model could not be loaded.
    #[error("Model error: {0}")]
    Model(#[from] AiError),

    /// The catalog could not be read or written.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Counts reported after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedSummary {
    pub products: usize,
    pub added: usize,
    pub embedded: usize,
}

/// Load the model and embed the catalog in place.
///
/// # Arguments
///
/// * `catalog_path` - Catalog JSON to update
/// * `data_dir` - Base for each product's `image_path_for_ai`
/// * `model` - ONNX model path
/// * `force` - Recompute embeddings that are already present
pub fn run(
    catalog_path: &Path,
    data_dir: &Path,
    model: Option<PathBuf>,
    force: bool,
) -> Result<EmbedSummary, EmbedError> {
    let model = model.ok_or(EmbedError::MissingModel)?;
    tracing::info!(model = %model.display(), "Loading ViT model...");
    let embedder = VitEmbedder::load(&model)?;

    embed_file(catalog_path, data_dir, &embedder, force)
}

/// Embed the catalog file with any embedder and write it back.
pub fn embed_file(
    catalog_path: &Path,
    data_dir: &Path,
    embedder: &dyn ImageEmbedder,
    force: bool,
) -> Result<EmbedSummary, EmbedError> {
    let mut products = read_products(catalog_path)?;
    if force {
        for product in &mut products {
            product.embedding = None;
        }
    }

    tracing::info!(count = products.len(), force, "Embedding catalog images...");
    let added = embed_missing(&mut products, data_dir, embedder);
    write_products(catalog_path, &products)?;

    let summary = EmbedSummary {
        products: products.len(),
        added,
        embedded: products.iter().filter(|p| p.embedding.is_some()).count(),
    };
    tracing::info!(
        products = summary.products,
        added = summary.added,
        embedded = summary.embedded,
        "Catalog embeddings saved"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use shopsmarter_server::catalog::Product;

    struct Constant;

    impl ImageEmbedder for Constant {
        fn embed(&self, _image: &DynamicImage) -> Result<Vec<f32>, AiError> {
            Ok(vec![0.5, 0.5])
        }
    }

    fn write_fixture(dir: &Path) -> PathBuf {
        DynamicImage::new_rgb8(4, 4)
            .save(dir.join("a.png"))
            .expect("save image");
        let products: Vec<Product> = serde_json::from_value(serde_json::json!([
            {"id": "a", "name": "Has image", "image_path_for_ai": "a.png"},
            {"id": "b", "name": "Precomputed", "image_path_for_ai": "a.png", "embedding": [1.0]},
            {"id": "c", "name": "No image"}
        ]))
        .expect("products");
        let path = dir.join("catalog.json");
        write_products(&path, &products).expect("write");
        path
    }

    #[test]
    fn test_embed_missing_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_fixture(dir.path());

        let summary = embed_file(&path, dir.path(), &Constant, false).expect("embed");
        assert_eq!(
            summary,
            EmbedSummary {
                products: 3,
                added: 1,
                embedded: 2
            }
        );

        let products = read_products(&path).expect("read");
        assert_eq!(products[1].embedding, Some(vec![1.0]));
    }

    #[test]
    fn test_force_recomputes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_fixture(dir.path());

        let summary = embed_file(&path, dir.path(), &Constant, true).expect("embed");
        assert_eq!(summary.added, 2);

        let products = read_products(&path).expect("read");
        assert_eq!(products[1].embedding, Some(vec![0.5, 0.5]));
    }

    #[test]
    fn test_missing_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_fixture(dir.path());
        assert!(matches!(
            run(&path, dir.path(), None, false),
            Err(EmbedError::MissingModel)
        ));
    }
}
