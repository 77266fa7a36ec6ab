//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Landing page
//! GET  /api/health                - Liveness
//! GET  /api/health/ready          - Readiness (database)
//!
//! # Recommendations
//! POST /upload_image              - Multipart image + prompt
//! POST /get_recommendations       - JSON text prompt
//!
//! # Auth
//! POST /api/signup                - Create account and log in
//! POST /api/login                 - Log in
//! POST /api/logout                - Log out
//! GET  /api/current_user_status   - Session user with wishlist and cart
//!
//! # Account (requires auth)
//! GET    /api/wishlist            - Wishlist ids and products
//! POST   /api/wishlist            - Add product
//! DELETE /api/wishlist            - Remove product
//! GET    /api/cart                - Priced cart
//! POST   /api/cart                - Add product (quantity adds up)
//! DELETE /api/cart                - Remove product
//! GET    /api/preferences         - Stored preferences
//! PUT    /api/preferences         - Replace preferences
//! POST   /api/mock_checkout_process - Summarize and clear cart
//! ```

pub mod auth;
pub mod cart;
pub mod health;
pub mod home;
pub mod preferences;
pub mod recommendations;
pub mod wishlist;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, rejection::JsonRejection},
    routing::{get, post},
};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Room for multipart framing and the prompt field on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the recommendation routes router.
///
/// The upload route's body limit is the configured file limit plus
/// multipart overhead.
pub fn recommendation_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload_image",
            post(recommendations::upload_image).layer(DefaultBodyLimit::max(
                max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
            )),
        )
        .route(
            "/get_recommendations",
            post(recommendations::get_recommendations),
        )
}

/// Create the JSON API routes router (mounted under `/api`).
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/current_user_status", get(auth::current_user_status))
        .route(
            "/wishlist",
            get(wishlist::list).post(wishlist::add).delete(wishlist::remove),
        )
        .route("/cart", get(cart::show).post(cart::add).delete(cart::remove))
        .route("/mock_checkout_process", post(cart::mock_checkout_process))
        .route("/preferences", get(preferences::show).put(preferences::update))
}

/// Create the full application router (without middleware layers).
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(home::index))
        .merge(recommendation_routes(max_upload_bytes))
        .nest("/api", api_routes())
}

/// Unwrap a JSON body, turning axum's plain-text rejection into a JSON 400.
pub(crate) fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}
