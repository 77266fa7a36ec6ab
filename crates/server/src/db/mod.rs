//! Database operations for the ShopSmarter SQLite store.
//!
//! Products live in the catalog file, so the database only holds
//! per-user state:
//!
//! ## Tables
//!
//! - `users` - Accounts (username, optional email, argon2 hash)
//! - `user_preferences` - One JSON blob per user
//! - `user_wishlist` - Saved product ids
//! - `user_cart` - Product ids with quantities
//! - `tower_sessions` - Created by the session store's own migration
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/`, applied on server
//! start and by:
//! ```bash
//! cargo run -p shopsmarter-cli -- migrate
//! ```

pub mod cart;
pub mod preferences;
pub mod users;
pub mod wishlist;

use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;
use tower_sessions_sqlx_store::SqliteStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation. Holds the column that clashed.
    #[error("{0} already exists")]
    Conflict(String),

    /// A per-user row was written for a user that no longer exists.
    #[error("user does not exist")]
    MissingUser,
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_or_database(err: sqlx::Error, column: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(column.to_string());
    }
    RepositoryError::Database(err)
}

/// Map a `users` foreign-key violation to `MissingUser`, anything else to `Database`.
pub(crate) fn missing_user_or_database(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::MissingUser;
    }
    RepositoryError::Database(err)
}

/// Create a SQLite connection pool, creating the database file if needed.
///
/// In-memory URLs (`sqlite::memory:`) get a single long-lived connection so
/// every query sees the same database.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the connection fails.
pub async fn create_pool(database_url: &SecretString) -> Result<SqlitePool, sqlx::Error> {
    let url = database_url.expose_secret();
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    if url.contains(":memory:") || url.contains("mode=memory") {
        return SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await;
    }

    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options.journal_mode(SqliteJournalMode::Wal))
        .await
}

/// Apply the embedded schema migrations.
///
/// # Errors
///
/// Returns `RepositoryError::Migration` if a migration fails to apply.
pub async fn migrate(pool: &SqlitePool) -> Result<(), RepositoryError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Create the session table and return a store backed by it.
///
/// # Errors
///
/// Returns an error if the session table cannot be created.
pub async fn migrate_session_store(pool: &SqlitePool) -> Result<SqliteStore, sqlx::Error> {
    let store = SqliteStore::new(pool.clone());
    store.migrate().await?;
    Ok(store)
}

/// Check that the database answers a trivial query.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn ping(pool: &SqlitePool) -> Result<(), RepositoryError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use secrecy::SecretString;
    use sqlx::SqlitePool;

    /// Fresh migrated in-memory database.
    pub async fn memory_pool() -> SqlitePool {
        let pool = super::create_pool(&SecretString::from("sqlite::memory:"))
            .await
            .expect("in-memory pool");
        super::migrate(&pool).await.expect("migrations apply");
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let pool = test_support::memory_pool().await;
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'user%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .expect("list tables");
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(
            names,
            ["user_cart", "user_preferences", "user_wishlist", "users"]
        );
        assert!(ping(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn test_session_store_table() {
        let pool = test_support::memory_pool().await;
        migrate_session_store(&pool).await.expect("session migration");
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'tower_sessions'",
        )
        .fetch_one(&pool)
        .await
        .expect("query");
        assert_eq!(count, 1);
    }
}
