//! Cart route handlers.
//!
//! The cart lives in `SQLite` per user. Prices are resolved from the catalog
//! on every read, so totals follow the current catalog.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use shopsmarter_core::ProductId;

use crate::catalog::deserialize_product_id;
use crate::db::cart::{CartRepository, MAX_CART_QUANTITY};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::routes::json_body;
use crate::routes::wishlist::ProductRequest;
use crate::services::checkout;
use crate::state::AppState;

/// Add-to-cart body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    #[serde(deserialize_with = "deserialize_product_id")]
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

const fn default_quantity() -> i64 {
    1
}

/// Show the priced cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let lines = CartRepository::new(state.pool()).list(user.id).await?;
    let summary = checkout::summarize(state.catalog(), lines);
    Ok(Json(summary).into_response())
}

/// Add a product, adding to the quantity if it is already in the cart.
///
/// The running quantity stops at [`MAX_CART_QUANTITY`].
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: std::result::Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<Response> {
    let request = json_body(body)?;
    if request.product_id.is_empty() {
        return Err(AppError::BadRequest("Product ID is required".to_string()));
    }
    let quantity = u32::try_from(request.quantity)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| AppError::BadRequest("Quantity must be at least 1".to_string()))?;
    if quantity > MAX_CART_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "Quantity must be at most {MAX_CART_QUANTITY}"
        )));
    }

    let total = CartRepository::new(state.pool())
        .add(user.id, &request.product_id, quantity)
        .await?;

    Ok(Json(json!({
        "message": "Product added to cart",
        "product_id": request.product_id,
        "quantity": total,
    }))
    .into_response())
}

/// Remove a product from the cart entirely.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: std::result::Result<Json<ProductRequest>, JsonRejection>,
) -> Result<Response> {
    let product_id = json_body(body)?.into_product_id()?;
    let removed = CartRepository::new(state.pool())
        .remove(user.id, &product_id)
        .await?;

    if !removed {
        return Err(AppError::NotFound("Product not in cart".to_string()));
    }
    Ok(Json(json!({
        "message": "Product removed from cart",
        "product_id": product_id,
    }))
    .into_response())
}

/// Summarize and clear the cart. No payment is taken.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn mock_checkout_process(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let order = checkout::place_mock_order(state.pool(), state.catalog(), user.id).await?;

    Ok(Json(json!({
        "message": "Checkout successful",
        "order": order,
    }))
    .into_response())
}
