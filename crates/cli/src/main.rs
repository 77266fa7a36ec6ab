//! ShopSmarter CLI - database migrations and catalog tooling.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! shopsmarter-cli migrate
//!
//! # Curate a catalog from styles.csv and its image folder
//! shopsmarter-cli prepare-dataset --styles raw/styles.csv --images raw/images
//!
//! # Precompute ViT embeddings into the catalog file
//! shopsmarter-cli embed-catalog --model models/vit.onnx
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `prepare-dataset` - Build `curated_product_catalog.json`
//! - `embed-catalog` - Fill in catalog embeddings
//!
//! Paths default to the server's environment (`SHOPSMARTER_DATA_DIR`,
//! `SHOPSMARTER_CATALOG_FILE`, `SHOPSMARTER_VIT_MODEL_PATH`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use shopsmarter_server::config::{AiConfig, PathsConfig};

mod commands;

#[derive(Parser)]
#[command(name = "shopsmarter-cli")]
#[command(author, version, about = "ShopSmarter CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        /// `SQLite` URL (defaults to `SHOPSMARTER_DATABASE_URL`)
        #[arg(long)]
        database_url: Option<String>,
    },
    /// Build the product catalog from a styles CSV and image folder
    PrepareDataset {
        /// Path to `styles.csv`
        #[arg(long, default_value = "kaggle_dataset_raw/styles.csv")]
        styles: PathBuf,

        /// Folder of `<id>.jpg` images
        #[arg(long, default_value = "kaggle_dataset_raw/images")]
        images: PathBuf,

        /// Server data dir (defaults to `SHOPSMARTER_DATA_DIR`)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Maximum number of products to keep
        #[arg(long, default_value_t = commands::dataset::DEFAULT_MAX_PRODUCTS)]
        max_products: usize,
    },
    /// Compute ViT embeddings for catalog products
    EmbedCatalog {
        /// ONNX model (defaults to `SHOPSMARTER_VIT_MODEL_PATH`)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Server data dir (defaults to `SHOPSMARTER_DATA_DIR`)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Recompute embeddings that already exist
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Migrate { database_url } => commands::migrate::run(database_url).await?,
        Commands::PrepareDataset {
            styles,
            images,
            data_dir,
            max_products,
        } => {
            let mut paths = PathsConfig::from_env();
            if let Some(dir) = data_dir {
                paths.data_dir = dir;
            }
            let options = commands::dataset::PrepareOptions {
                styles_csv: styles,
                images_dir: images,
                data_dir: paths.data_dir,
                catalog_file: paths.catalog_file,
                max_products,
            };
            tokio::task::spawn_blocking(move || commands::dataset::run(&options)).await??;
        }
        Commands::EmbedCatalog {
            model,
            data_dir,
            force,
        } => {
            let mut paths = PathsConfig::from_env();
            if let Some(dir) = data_dir {
                paths.data_dir = dir;
            }
            let model = model.or_else(|| AiConfig::from_env().vit_model_path);
            tokio::task::spawn_blocking(move || {
                commands::embed::run(&paths.catalog_path(), &paths.data_dir, model, force)
            })
            .await??;
        }
    }
    Ok(())
}
