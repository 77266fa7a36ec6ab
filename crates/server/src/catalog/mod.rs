//! In-memory product catalog.
//!
//! The catalog is a JSON array of products read once at startup. Products
//! whose file entry has no embedding get one computed from
//! `image_path_for_ai` when a vision model is available. After that the
//! catalog is immutable and shared behind an `Arc`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use shopsmarter_core::ProductId;

use crate::ai::vision::ImageEmbedder;

/// Image shown for products without any `images`.
pub const PLACEHOLDER_IMAGE_URL: &str = "/static/placeholder.png";

/// Errors that can occur reading or writing the catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// File could not be read or written.
    #[error("catalog io error at {path}: {source}")]
    Io {
        /// Catalog file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// File is not a JSON array of products.
    #[error("catalog json error at {path}: {source}")]
    Json {
        /// Catalog file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// A catalog entry as stored in the catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (numeric ids in the file are accepted).
    #[serde(deserialize_with = "deserialize_product_id")]
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Display price such as `"$119.99"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Article type (`"Tshirts"`, `"Watches"`, ...).
    #[serde(rename = "type", default)]
    pub product_type: String,
    /// Top-level category (`"Apparel"`, `"Footwear"`, ...).
    #[serde(default)]
    pub category: String,
    /// Usage/style (`"Casual"`, `"Formal"`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Lowercased colour names.
    #[serde(default)]
    pub color_tags: Vec<String>,
    /// Image file to embed, relative to the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path_for_ai: Option<String>,
    /// Web paths of product images.
    #[serde(default)]
    pub images: Vec<String>,
    /// ViT embedding, if computed.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Product {
    /// The image URL shown to shoppers.
    #[must_use]
    pub fn image_url(&self) -> &str {
        self.images
            .first()
            .map_or(PLACEHOLDER_IMAGE_URL, String::as_str)
    }

    /// Lowercased concatenation of every text field keywords match against.
    #[must_use]
    pub fn search_text(&self) -> String {
        let mut fields = vec![
            self.name.as_str(),
            self.description.as_str(),
            self.product_type.as_str(),
            self.category.as_str(),
            self.style.as_deref().unwrap_or_default(),
        ];
        fields.extend(self.color_tags.iter().map(String::as_str));
        fields.join(" ").to_lowercase()
    }

    /// Response view without the embedding or the server-side image path.
    #[must_use]
    pub fn view(&self) -> ProductView<'_> {
        ProductView {
            id: &self.id,
            name: &self.name,
            price: self.price.as_deref(),
            description: &self.description,
            product_type: &self.product_type,
            category: &self.category,
            style: self.style.as_deref(),
            color_tags: &self.color_tags,
            images: &self.images,
            image_url: self.image_url(),
        }
    }
}

/// A product as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView<'a> {
    pub id: &'a ProductId,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<&'a str>,
    pub description: &'a str,
    #[serde(rename = "type")]
    pub product_type: &'a str,
    pub category: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<&'a str>,
    pub color_tags: &'a [String],
    pub images: &'a [String],
    #[serde(rename = "imageUrl")]
    pub image_url: &'a str,
}

/// Accept a product id written as a JSON string or number.
pub(crate) fn deserialize_product_id<'de, D>(deserializer: D) -> Result<ProductId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => ProductId::new(s),
        RawId::Number(n) => ProductId::new(n.to_string()),
    })
}

/// The loaded catalog with an id index.
#[derive(Debug, Default)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<ProductId, usize>,
}

impl Catalog {
    /// Build a catalog, dropping blank ids and every duplicate after the first.
    #[must_use]
    pub fn new(products: Vec<Product>) -> Self {
        let mut kept = Vec::with_capacity(products.len());
        let mut index = HashMap::with_capacity(products.len());

        for product in products {
            if product.id.is_empty() {
                tracing::warn!(name = %product.name, "Skipping catalog product with empty id");
                continue;
            }
            if index.contains_key(&product.id) {
                tracing::warn!(product_id = %product.id, "Skipping duplicate catalog product");
                continue;
            }
            index.insert(product.id.clone(), kept.len());
            kept.push(product);
        }

        Self {
            products: kept,
            index,
        }
    }

    /// Load the catalog file, treating a missing or unreadable file as empty.
    ///
    /// With an embedder, products without an embedding get one computed from
    /// their image under `data_dir`. This blocks on model inference.
    #[must_use]
    pub fn load(path: &Path, data_dir: &Path, embedder: Option<&dyn ImageEmbedder>) -> Self {
        let mut products = match read_products(path) {
            Ok(products) => {
                tracing::info!(path = %path.display(), count = products.len(), "Loaded catalog");
                products
            }
            Err(CatalogError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::error!(path = %path.display(), "Catalog file not found, serving an empty catalog");
                return Self::default();
            }
            Err(e) => {
                tracing::error!(error = %e, "Catalog could not be loaded, serving an empty catalog");
                return Self::default();
            }
        };

        if let Some(embedder) = embedder {
            let added = embed_missing(&mut products, data_dir, embedder);
            tracing::info!(added, "Computed missing product embeddings");
        }

        let catalog = Self::new(products);
        tracing::info!(
            products = catalog.len(),
            embedded = catalog.embedded_count(),
            "Catalog ready"
        );
        catalog
    }

    /// All products in file order.
    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Look up a product by id.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.index.get(id).and_then(|&i| self.products.get(i))
    }

    /// Number of products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog has no products.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Number of products carrying an embedding.
    #[must_use]
    pub fn embedded_count(&self) -> usize {
        self.products.iter().filter(|p| p.embedding.is_some()).count()
    }
}

/// Read the raw product list from a catalog file.
///
/// # Errors
///
/// Returns `CatalogError::Io` if the file cannot be read and
/// `CatalogError::Json` if it is not a JSON array of products.
pub fn read_products(path: &Path) -> Result<Vec<Product>, CatalogError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CatalogError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a product list as pretty-printed JSON.
///
/// # Errors
///
/// Returns `CatalogError::Io` if the file cannot be written.
pub fn write_products(path: &Path, products: &[Product]) -> Result<(), CatalogError> {
    let json = serde_json::to_string_pretty(products).map_err(|source| CatalogError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Compute embeddings for products that lack one.
///
/// Image paths resolve against `data_dir`. Missing files and failed
/// inferences are logged and leave the embedding absent. Returns how many
/// embeddings were added.
pub fn embed_missing(
    products: &mut [Product],
    data_dir: &Path,
    embedder: &dyn ImageEmbedder,
) -> usize {
    let mut added = 0;

    for product in products.iter_mut().filter(|p| p.embedding.is_none()) {
        let Some(relative) = product.image_path_for_ai.as_deref() else {
            continue;
        };
        let path = data_dir.join(relative);
        if !path.is_file() {
            tracing::warn!(product_id = %product.id, path = %path.display(), "Image for embedding not found");
            continue;
        }

        match embedder.embed_file(&path) {
            Ok(embedding) => {
                product.embedding = Some(embedding);
                added += 1;
            }
            Err(e) => {
                tracing::warn!(product_id = %product.id, error = %e, "Failed to embed product image");
            }
        }
    }

    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiError;
    use image::DynamicImage;
    use serde_json::json;

    fn product(id: &str, name: &str) -> Product {
        serde_json::from_value(json!({"id": id, "name": name})).expect("product")
    }

    #[test]
    fn test_deserialize_file_entry() {
        let product: Product = serde_json::from_value(json!({
            "id": 1163,
            "name": "Nike Sahara Team India Fanwear Round Neck Jersey",
            "price": "$119.99",
            "description": "A Men Tshirts in Blue.",
            "type": "Tshirts",
            "category": "Apparel",
            "style": "Sports",
            "color_tags": ["blue"],
            "image_path_for_ai": "static/product_images_db/1163.jpg",
            "images": ["/static/product_images_db/1163.jpg"],
            "embedding": null
        }))
        .expect("deserialize");

        assert_eq!(product.id.as_str(), "1163");
        assert_eq!(product.product_type, "Tshirts");
        assert_eq!(product.image_url(), "/static/product_images_db/1163.jpg");
        assert!(product.embedding.is_none());
    }

    #[test]
    fn test_view_hides_internal_fields() {
        let mut p = product("7", "Canvas Tote");
        p.embedding = Some(vec![0.1, 0.2]);
        p.image_path_for_ai = Some("static/x.jpg".into());

        let value = serde_json::to_value(p.view()).expect("serialize");
        assert_eq!(value["imageUrl"], PLACEHOLDER_IMAGE_URL);
        assert_eq!(value["type"], "");
        assert!(value.get("embedding").is_none());
        assert!(value.get("image_path_for_ai").is_none());
        assert!(value.get("visual_score").is_none());
    }

    #[test]
    fn test_search_text_lowercases_all_fields() {
        let mut p = product("1", "Red Dress");
        p.description = "Floral PRINT".into();
        p.style = Some("Casual".into());
        p.color_tags = vec!["Red".into(), "white".into()];
        let text = p.search_text();
        assert!(text.contains("red dress"));
        assert!(text.contains("floral print"));
        assert!(text.contains("casual"));
        assert!(text.contains("white"));
    }

    #[test]
    fn test_catalog_dedupes_and_indexes() {
        let catalog = Catalog::new(vec![
            product("1", "First"),
            product("2", "Second"),
            product("1", "Duplicate"),
            product("  ", "Blank"),
        ]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get(&ProductId::new("1")).map(|p| p.name.as_str()),
            Some("First")
        );
        assert!(catalog.get(&ProductId::new("3")).is_none());
    }

    #[test]
    fn test_load_missing_or_bad_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let catalog = Catalog::load(&dir.path().join("missing.json"), dir.path(), None);
        assert!(catalog.is_empty());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").expect("write");
        assert!(Catalog::load(&bad, dir.path(), None).is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.json");
        let mut p = product("9", "Watch");
        p.embedding = Some(vec![1.0, 0.0]);

        write_products(&path, &[p.clone()]).expect("write");
        assert_eq!(read_products(&path).expect("read"), vec![p]);
    }

    struct Fixed;

    impl ImageEmbedder for Fixed {
        fn embed(&self, _image: &DynamicImage) -> Result<Vec<f32>, AiError> {
            Ok(vec![1.0, 2.0])
        }
    }

    #[test]
    fn test_embed_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("static")).expect("mkdir");
        DynamicImage::new_rgb8(4, 4)
            .save(dir.path().join("static/a.png"))
            .expect("save");

        let mut with_image = product("a", "Has image");
        with_image.image_path_for_ai = Some("static/a.png".into());
        let mut missing_file = product("b", "Missing file");
        missing_file.image_path_for_ai = Some("static/b.png".into());
        let mut already = product("c", "Precomputed");
        already.image_path_for_ai = Some("static/a.png".into());
        already.embedding = Some(vec![9.0]);
        let no_path = product("d", "No path");

        let mut products = vec![with_image, missing_file, already, no_path];
        let added = embed_missing(&mut products, dir.path(), &Fixed);

        assert_eq!(added, 1);
        assert_eq!(products[0].embedding, Some(vec![1.0, 2.0]));
        assert!(products[1].embedding.is_none());
        assert_eq!(products[2].embedding, Some(vec![9.0]));
        assert!(products[3].embedding.is_none());
    }

    #[test]
    fn test_load_embeds_with_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        DynamicImage::new_rgb8(4, 4)
            .save(dir.path().join("a.png"))
            .expect("save");
        let mut p = product("a", "Has image");
        p.image_path_for_ai = Some("a.png".into());
        let path = dir.path().join("catalog.json");
        write_products(&path, &[p, product("b", "No image")]).expect("write");

        let catalog = Catalog::load(&path, dir.path(), Some(&Fixed));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.embedded_count(), 1);
    }
}
