//! Catalog preparation from a fashion-products dataset.
//!
//! # Usage
//!
//! ```bash
//! shopsmarter-cli prepare-dataset \
//!     --styles kaggle_dataset_raw/styles.csv \
//!     --images kaggle_dataset_raw/images \
//!     --data-dir . \
//!     --max-products 2000
//! ```
//!
//! Reads `styles.csv`, keeps the first rows whose `<id>.jpg` exists in the
//! image folder, copies those images to `static/product_images_db/` under
//! the data dir and writes the catalog JSON there. Embeddings are left
//! empty for `embed-catalog` or the server to fill in.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use shopsmarter_core::ProductId;
use shopsmarter_server::catalog::{CatalogError, Product, write_products};

/// Folder under `static/` that holds catalog images.
pub const PRODUCT_IMAGES_DIR: &str = "product_images_db";

/// Default number of products to keep.
pub const DEFAULT_MAX_PRODUCTS: usize = 2000;

/// Errors that can occur while preparing the dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The styles CSV could not be opened.
    #[error("Cannot read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Creating the image folder or copying an image failed.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog file could not be written.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Options for [`run`].
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    /// Path to `styles.csv`.
    pub styles_csv: PathBuf,
    /// Folder holding `<id>.jpg` images.
    pub images_dir: PathBuf,
    /// Server data dir; images go to `static/product_images_db/` under it.
    pub data_dir: PathBuf,
    /// Catalog file name, relative to `data_dir`.
    pub catalog_file: PathBuf,
    /// Stop after this many products.
    pub max_products: usize,
}

/// One row of `styles.csv`. Every column but `id` may be blank.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StyleRow {
    id: String,
    gender: Option<String>,
    master_category: Option<String>,
    article_type: Option<String>,
    base_colour: Option<String>,
    season: Option<String>,
    usage: Option<String>,
    product_display_name: Option<String>,
}

/// Build the catalog. Returns how many products were written.
///
/// Malformed CSV rows are skipped with a warning.
pub fn run(options: &PrepareOptions) -> Result<usize, DatasetError> {
    let image_dir = options.data_dir.join("static").join(PRODUCT_IMAGES_DIR);
    std::fs::create_dir_all(&image_dir).map_err(|source| DatasetError::Io {
        path: image_dir.clone(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(&options.styles_csv)
        .map_err(|source| DatasetError::Csv {
            path: options.styles_csv.clone(),
            source,
        })?;

    tracing::info!(
        styles = %options.styles_csv.display(),
        max = options.max_products,
        "Curating products"
    );

    let mut products = Vec::new();
    let mut seen = HashSet::new();
    let mut skipped_rows = 0_usize;

    for record in reader.deserialize::<StyleRow>() {
        if products.len() >= options.max_products {
            break;
        }

        let row = match record {
            Ok(row) => row,
            Err(e) => {
                skipped_rows += 1;
                tracing::debug!(error = %e, "Skipping malformed row");
                continue;
            }
        };

        let id = row.id.trim().to_string();
        if id.is_empty() || seen.contains(&id) {
            continue;
        }

        let file_name = format!("{id}.jpg");
        let source = options.images_dir.join(&file_name);
        if !source.is_file() {
            continue;
        }
        let destination = image_dir.join(&file_name);
        std::fs::copy(&source, &destination).map_err(|e| DatasetError::Io {
            path: destination.clone(),
            source: e,
        })?;

        products.push(product_from_row(row, &id, &file_name));
        seen.insert(id);
    }

    if skipped_rows > 0 {
        tracing::warn!(skipped_rows, "Skipped malformed CSV rows");
    }

    let catalog_path = options.data_dir.join(&options.catalog_file);
    write_products(&catalog_path, &products)?;
    tracing::info!(
        count = products.len(),
        path = %catalog_path.display(),
        "Catalog written"
    );

    Ok(products.len())
}

fn product_from_row(row: StyleRow, id: &str, file_name: &str) -> Product {
    let image_path_for_ai = format!("static/{PRODUCT_IMAGES_DIR}/{file_name}");
    let web_path = format!("/{image_path_for_ai}");

    let gender = non_blank(row.gender);
    let article_type = non_blank(row.article_type);
    let base_colour = non_blank(row.base_colour);
    let usage = non_blank(row.usage);
    let season = non_blank(row.season);

    let description = format!(
        "A {} {} in {}. Suitable for {} during the {}.",
        gender.as_deref().unwrap_or_default(),
        article_type.as_deref().unwrap_or_default(),
        base_colour.as_deref().unwrap_or_default(),
        usage.as_deref().unwrap_or("casual wear"),
        season.as_deref().unwrap_or("all seasons"),
    );

    Product {
        id: ProductId::new(id),
        name: non_blank(row.product_display_name).unwrap_or_else(|| format!("Item {id}")),
        price: Some(demo_price(id)),
        description,
        product_type: article_type.unwrap_or_else(|| "Unknown".to_string()),
        category: non_blank(row.master_category).unwrap_or_else(|| "Unknown".to_string()),
        style: usage,
        color_tags: base_colour.map(|c| c.to_lowercase()).into_iter().collect(),
        image_path_for_ai: Some(image_path_for_ai),
        images: vec![web_path],
        embedding: None,
    }
}

/// A stable made-up price between `$19.99` and `$198.99`.
fn demo_price(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    let prefix = digest.as_slice().first_chunk::<8>().copied().unwrap_or_default();
    let dollars = u64::from_be_bytes(prefix) % 180 + 19;
    format!("${dollars}.99")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopsmarter_server::catalog::read_products;

    const STYLES: &str = "\
id,gender,masterCategory,subCategory,articleType,baseColour,season,year,usage,productDisplayName
15970,Men,Apparel,Topwear,Shirts,Navy Blue,Fall,2011,Casual,Turtle Check Men Navy Blue Shirt
39386,Men,Apparel,Bottomwear,Jeans,Blue,Summer,2012,Casual,Peter England Men Party Blue Jeans
15970,Men,Apparel,Topwear,Shirts,Navy Blue,Fall,2011,Casual,Duplicate Row
59263,Women,Accessories,Watches,Watches,Silver,Winter,2016,,
53759,Men,Apparel,Topwear,Tshirts,Grey,Summer,2012,Casual,No Image Tee
";

    fn fixture() -> (tempfile::TempDir, PrepareOptions) {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = dir.path().join("raw");
        let images = raw.join("images");
        std::fs::create_dir_all(&images).expect("mkdir");
        std::fs::write(raw.join("styles.csv"), STYLES).expect("write csv");
        for id in ["15970", "39386", "59263"] {
            std::fs::write(images.join(format!("{id}.jpg")), b"jpeg").expect("write image");
        }

        let options = PrepareOptions {
            styles_csv: raw.join("styles.csv"),
            images_dir: images,
            data_dir: dir.path().join("out"),
            catalog_file: PathBuf::from("catalog.json"),
            max_products: DEFAULT_MAX_PRODUCTS,
        };
        (dir, options)
    }

    #[test]
    fn test_prepare_dataset() {
        let (_dir, options) = fixture();
        assert_eq!(run(&options).expect("prepare"), 3);

        let products =
            read_products(&options.data_dir.join(&options.catalog_file)).expect("read");
        let ids: Vec<&str> = products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["15970", "39386", "59263"]);

        let shirt = &products[0];
        assert_eq!(shirt.name, "Turtle Check Men Navy Blue Shirt");
        assert_eq!(shirt.product_type, "Shirts");
        assert_eq!(shirt.color_tags, ["navy blue"]);
        assert_eq!(
            shirt.description,
            "A Men Shirts in Navy Blue. Suitable for Casual during the Fall."
        );
        assert_eq!(
            shirt.image_path_for_ai.as_deref(),
            Some("static/product_images_db/15970.jpg")
        );
        assert_eq!(shirt.images, ["/static/product_images_db/15970.jpg"]);
        assert!(
            options
                .data_dir
                .join("static/product_images_db/15970.jpg")
                .is_file()
        );

        let watch = &products[2];
        assert_eq!(watch.name, "Item 59263");
        assert!(watch.style.is_none());
        assert!(watch.description.ends_with("Suitable for casual wear during the Winter."));
    }

    #[test]
    fn test_max_products() {
        let (_dir, mut options) = fixture();
        options.max_products = 1;
        assert_eq!(run(&options).expect("prepare"), 1);
    }

    #[test]
    fn test_demo_price_is_stable_and_in_range() {
        let price = demo_price("15970");
        assert_eq!(price, demo_price("15970"));
        let dollars: u64 = price
            .trim_start_matches('$')
            .trim_end_matches(".99")
            .parse()
            .expect("number");
        assert!((19..=198).contains(&dollars));
    }

    #[test]
    fn test_missing_csv() {
        let (_dir, mut options) = fixture();
        options.styles_csv = PathBuf::from("/nonexistent/styles.csv");
        assert!(matches!(run(&options), Err(DatasetError::Csv { .. })));
    }
}
