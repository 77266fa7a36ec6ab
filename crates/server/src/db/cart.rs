//! Cart repository.

use sqlx::{FromRow, SqlitePool};

use shopsmarter_core::{ProductId, UserId};

use super::{RepositoryError, missing_user_or_database};

/// Most units of one product a cart line can hold. Adds past it saturate.
pub const MAX_CART_QUANTITY: u32 = 999;

/// A product id and how many of it are in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    /// Catalog product id (may no longer exist in the catalog).
    pub product_id: ProductId,
    /// Between 1 and [`MAX_CART_QUANTITY`].
    pub quantity: u32,
}

#[derive(Debug, FromRow)]
struct CartRow {
    product_id: String,
    quantity: i64,
}

impl TryFrom<CartRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "invalid cart quantity {} for product {}",
                    row.quantity, row.product_id
                ))
            })?;

        Ok(Self {
            product_id: ProductId::new(row.product_id),
            quantity,
        })
    }
}

/// Repository for a user's cart.
pub struct CartRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Cart lines in the order they were first added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored quantity is invalid.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<CartRow> = sqlx::query_as(
            "SELECT product_id, quantity FROM user_cart WHERE user_id = ? ORDER BY added_at, rowid",
        )
        .bind(user_id.as_i64())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    /// Add `quantity` of a product, increasing the quantity if it is already present.
    ///
    /// The stored quantity never exceeds [`MAX_CART_QUANTITY`]. Returns the
    /// resulting quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::MissingUser` if the user was deleted.
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<u32, RepositoryError> {
        let row: CartRow = sqlx::query_as(
            r"
            INSERT INTO user_cart (user_id, product_id, quantity)
            VALUES (?1, ?2, MIN(?3, ?4))
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = MIN(quantity + excluded.quantity, ?4)
            RETURNING product_id, quantity
            ",
        )
        .bind(user_id.as_i64())
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .bind(i64::from(MAX_CART_QUANTITY))
        .fetch_one(self.pool)
        .await
        .map_err(missing_user_or_database)?;

        Ok(CartLine::try_from(row)?.quantity)
    }

    /// Remove a product entirely.
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
        let result = sqlx::query("DELETE FROM user_cart WHERE user_id = ? AND product_id = ?")
            .bind(user_id.as_i64())
            .bind(product_id.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Empty the cart.
    ///
    /// Returns the number of lines removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM user_cart WHERE user_id = ?")
            .bind(user_id.as_i64())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;
    use crate::db::users::UserRepository;
    use shopsmarter_core::Username;

    async fn user(pool: &SqlitePool) -> UserId {
        UserRepository::new(pool)
            .create(&Username::parse("carter").expect("valid"), None, "h")
            .await
            .expect("user")
            .id
    }

    #[tokio::test]
    async fn test_add_increments_quantity() {
        let pool = memory_pool().await;
        let user_id = user(&pool).await;
        let repo = CartRepository::new(&pool);
        let shirt = ProductId::new("10");

        assert_eq!(repo.add(user_id, &shirt, 1).await.expect("add"), 1);
        assert_eq!(repo.add(user_id, &shirt, 2).await.expect("add"), 3);
        repo.add(user_id, &ProductId::new("11"), 1).await.expect("add");

        let lines = repo.list(user_id).await.expect("list");
        assert_eq!(
            lines,
            vec![
                CartLine { product_id: shirt.clone(), quantity: 3 },
                CartLine { product_id: ProductId::new("11"), quantity: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let pool = memory_pool().await;
        let user_id = user(&pool).await;
        let repo = CartRepository::new(&pool);

        repo.add(user_id, &ProductId::new("a"), 1).await.expect("add");
        repo.add(user_id, &ProductId::new("b"), 1).await.expect("add");

        assert!(repo.remove(user_id, &ProductId::new("a")).await.expect("remove"));
        assert!(!repo.remove(user_id, &ProductId::new("a")).await.expect("remove"));
        assert_eq!(repo.clear(user_id).await.expect("clear"), 1);
        assert!(repo.list(user_id).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_add_saturates_at_max_quantity() {
        let pool = memory_pool().await;
        let user_id = user(&pool).await;
        let repo = CartRepository::new(&pool);
        let shirt = ProductId::new("10");

        assert_eq!(
            repo.add(user_id, &shirt, MAX_CART_QUANTITY).await.expect("add"),
            MAX_CART_QUANTITY
        );
        assert_eq!(
            repo.add(user_id, &shirt, MAX_CART_QUANTITY).await.expect("add"),
            MAX_CART_QUANTITY
        );
        assert_eq!(
            repo.add(user_id, &ProductId::new("11"), u32::MAX).await.expect("add"),
            MAX_CART_QUANTITY
        );

        let lines = repo.list(user_id).await.expect("list");
        assert!(lines.iter().all(|l| l.quantity == MAX_CART_QUANTITY));
    }

    #[tokio::test]
    async fn test_add_for_deleted_user() {
        let pool = memory_pool().await;
        let err = CartRepository::new(&pool)
            .add(UserId::new(404), &ProductId::new("10"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::MissingUser));
    }
}
