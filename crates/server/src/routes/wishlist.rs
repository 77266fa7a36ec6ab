//! Wishlist route handlers.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use shopsmarter_core::ProductId;

use crate::catalog::{Product, deserialize_product_id};
use crate::db::wishlist::WishlistRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::routes::json_body;
use crate::state::AppState;

/// Body naming a single product.
#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    #[serde(deserialize_with = "deserialize_product_id")]
    pub product_id: ProductId,
}

impl ProductRequest {
    /// The product id, rejecting blanks.
    pub(crate) fn into_product_id(self) -> Result<ProductId> {
        if self.product_id.is_empty() {
            return Err(AppError::BadRequest("Product ID is required".to_string()));
        }
        Ok(self.product_id)
    }
}

/// List wishlist product ids and the catalog products they resolve to.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>> {
    let ids = WishlistRepository::new(state.pool()).list(user.id).await?;
    let catalog = state.catalog();
    let products: Vec<_> = ids
        .iter()
        .filter_map(|id| catalog.get(id))
        .map(Product::view)
        .collect();

    Ok(Json(json!({
        "wishlist": ids,
        "products": products,
    })))
}

/// Add a product to the wishlist.
///
/// Ids are not checked against the catalog. Adding twice is not an error.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: std::result::Result<Json<ProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let product_id = json_body(body)?.into_product_id()?;
    let added = WishlistRepository::new(state.pool())
        .add(user.id, &product_id)
        .await?;

    let (status, message) = if added {
        (StatusCode::CREATED, "Product added to wishlist")
    } else {
        (StatusCode::OK, "Product already in wishlist")
    };
    Ok((
        status,
        Json(json!({ "message": message, "product_id": product_id })),
    ))
}

/// Remove a product from the wishlist.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: std::result::Result<Json<ProductRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let product_id = json_body(body)?.into_product_id()?;
    let removed = WishlistRepository::new(state.pool())
        .remove(user.id, &product_id)
        .await?;

    if !removed {
        return Err(AppError::NotFound("Product not in wishlist".to_string()));
    }
    Ok(Json(json!({
        "message": "Product removed from wishlist",
        "product_id": product_id,
    })))
}
