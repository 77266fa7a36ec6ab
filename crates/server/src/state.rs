//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::catalog::Catalog;
use crate::config::ServerConfig;
use crate::recommend::Recommender;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The catalog is loaded once at startup and
/// never mutated afterwards.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: SqlitePool,
    catalog: Arc<Catalog>,
    recommender: Recommender,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `pool` - `SQLite` connection pool (migrated)
    /// * `catalog` - Product catalog, embeddings already attached
    /// * `recommender` - AI clients and ranking pipeline
    #[must_use]
    pub fn new(
        config: ServerConfig,
        pool: SqlitePool,
        catalog: Catalog,
        recommender: Recommender,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog: Arc::new(catalog),
                recommender,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// Get a reference to the product catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Get a reference to the recommendation pipeline.
    #[must_use]
    pub fn recommender(&self) -> &Recommender {
        &self.inner.recommender
    }
}
