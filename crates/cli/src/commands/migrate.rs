//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! # Migrate the database named by SHOPSMARTER_DATABASE_URL
//! shopsmarter-cli migrate
//!
//! # Migrate a specific file
//! shopsmarter-cli migrate --database-url sqlite://data/shopsmarter.sqlite3
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPSMARTER_DATABASE_URL` - `SQLite` URL (falls back to `DATABASE_URL`,
//!   then `sqlite://shopsmarter.sqlite3`)
//!
//! The server also applies migrations at startup; this command exists for
//! deploys that prepare the database ahead of time.

use secrecy::SecretString;
use thiserror::Error;

use shopsmarter_server::config::database_url_from_env;
use shopsmarter_server::db::{self, RepositoryError};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Could not open the database.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] RepositoryError),
}

/// Apply the application and session-store schema.
///
/// # Arguments
///
/// * `database_url` - Overrides the URL from the environment
pub async fn run(database_url: Option<String>) -> Result<(), MigrationError> {
    let url = database_url.map_or_else(database_url_from_env, SecretString::from);

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&url).await?;

    tracing::info!("Running migrations...");
    db::migrate(&pool).await?;

    db::migrate_session_store(&pool).await?;

    pool.close().await;
    tracing::info!("Migrations complete!");
    Ok(())
}
