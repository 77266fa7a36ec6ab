//! Wishlist repository.

use sqlx::SqlitePool;

use shopsmarter_core::{ProductId, UserId};

use super::{RepositoryError, missing_user_or_database};

/// Repository for a user's saved products.
pub struct WishlistRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> WishlistRepository<'a> {
    /// Create a new wishlist repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Product ids on the user's wishlist, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<ProductId>, RepositoryError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT product_id FROM user_wishlist WHERE user_id = ? ORDER BY added_at, rowid",
        )
        .bind(user_id.as_i64())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| ProductId::new(id)).collect())
    }

    /// Add a product. Adding one that is already present is a no-op.
    ///
    /// Returns `true` if a row was inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::MissingUser` if the user was deleted.
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add(&self, user_id: UserId, product_id: &ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO user_wishlist (user_id, product_id) VALUES (?, ?)",
        )
        .bind(user_id.as_i64())
        .bind(product_id.as_str())
        .execute(self.pool)
        .await
        .map_err(missing_user_or_database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a product.
    ///
    /// Returns `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: &ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM user_wishlist WHERE user_id = ? AND product_id = ?")
            .bind(user_id.as_i64())
            .bind(product_id.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
