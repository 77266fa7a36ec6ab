//! Cart pricing and the mock checkout.
//!
//! Cart rows only hold product ids, so every summary resolves them against
//! the catalog. Ids that are no longer in the catalog are reported rather
//! than failing the request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use shopsmarter_core::{Price, ProductId, UserId};

use crate::catalog::{Catalog, ProductView};
use crate::db::RepositoryError;
use crate::db::cart::{CartLine, CartRepository};

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to check out.
    #[error("cart is empty")]
    EmptyCart,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// One cart line resolved against the catalog.
#[derive(Debug, Serialize)]
pub struct CartItem<'a> {
    pub product_id: ProductId,
    pub quantity: u32,
    /// `None` when the product is no longer in the catalog.
    pub product: Option<ProductView<'a>>,
    /// `None` when the product has no parseable price.
    pub line_total: Option<Price>,
}

/// A priced cart.
#[derive(Debug, Serialize)]
pub struct CartSummary<'a> {
    pub items: Vec<CartItem<'a>>,
    /// Sum of every priced line.
    pub total: Price,
    pub item_count: u32,
    /// Cart ids not found in the catalog.
    pub missing_products: Vec<ProductId>,
}

impl CartSummary<'_> {
    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Result of a mock checkout.
#[derive(Debug, Serialize)]
pub struct OrderConfirmation<'a> {
    pub order_id: Uuid,
    pub placed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub summary: CartSummary<'a>,
}

/// Price cart lines against the catalog.
#[must_use]
pub fn summarize(catalog: &Catalog, lines: Vec<CartLine>) -> CartSummary<'_> {
    let mut missing_products = Vec::new();
    let mut item_count = 0_u32;

    let items: Vec<CartItem<'_>> = lines
        .into_iter()
        .map(|line| {
            item_count = item_count.saturating_add(line.quantity);
            let product = catalog.get(&line.product_id);
            if product.is_none() {
                missing_products.push(line.product_id.clone());
            }

            let line_total = product
                .and_then(|p| p.price.as_deref())
                .and_then(|raw| {
                    Price::parse(raw)
                        .map_err(|e| {
                            tracing::warn!(product_id = %line.product_id, price = raw, error = %e, "Unparseable catalog price");
                        })
                        .ok()
                })
                .map(|unit| unit * line.quantity);

            CartItem {
                product_id: line.product_id,
                quantity: line.quantity,
                product: product.map(crate::catalog::Product::view),
                line_total,
            }
        })
        .collect();

    let total = items.iter().filter_map(|i| i.line_total).sum();

    CartSummary {
        items,
        total,
        item_count,
        missing_products,
    }
}

/// Price the user's cart, clear it, and return a confirmation.
///
/// No payment is taken and no order is stored.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart` if the cart has no lines.
/// Returns `CheckoutError::Repository` if the cart cannot be read or cleared.
pub async fn place_mock_order<'a>(
    pool: &SqlitePool,
    catalog: &'a Catalog,
    user_id: UserId,
) -> Result<OrderConfirmation<'a>, CheckoutError> {
    let carts = CartRepository::new(pool);
    let summary = summarize(catalog, carts.list(user_id).await?);
    if summary.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    carts.clear(user_id).await?;

    let confirmation = OrderConfirmation {
        order_id: Uuid::new_v4(),
        placed_at: Utc::now(),
        summary,
    };
    tracing::info!(
        user_id = %user_id,
        order_id = %confirmation.order_id,
        total = %confirmation.summary.total,
        "Mock checkout completed"
    );
    Ok(confirmation)
}
