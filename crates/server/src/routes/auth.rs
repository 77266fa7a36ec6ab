//! Authentication route handlers.
//!
//! JSON signup, login and logout against local accounts, plus the session
//! status endpoint the front end polls on load.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use crate::db::cart::CartRepository;
use crate::db::wishlist::WishlistRepository;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::routes::json_body;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Signup request body.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Public fields of a user.
fn user_json(user: &User) -> Value {
    json!({
        "id": user.id,
        "username": user.username.as_str(),
        "email": user.email.as_ref().map(|e| e.as_str()),
    })
}

/// Put the user in the session and tag Sentry with them.
async fn start_session(session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &CurrentUser::from(user)).await?;
    set_sentry_user(&user.id, user.username.as_str());
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// Create an account and log it in.
#[instrument(skip(state, session, body))]
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    body: std::result::Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let request = json_body(body)?;
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }

    let user = AuthService::new(state.pool())
        .register(
            &request.username,
            &request.password,
            request.email.as_deref(),
        )
        .await?;

    start_session(&session, &user).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "user": user_json(&user),
        })),
    ))
}

/// Log in with username and password.
#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let request = json_body(body)?;
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }

    let user = AuthService::new(state.pool())
        .login(&request.username, &request.password)
        .await?;

    start_session(&session, &user).await?;

    Ok(Json(json!({
        "message": "Login successful",
        "user": user_json(&user),
    })))
}

/// Log out, dropping all session data.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<Value>> {
    clear_current_user(&session).await?;
    clear_sentry_user();

    Ok(Json(json!({ "message": "Logout successful" })))
}

/// Report whether a user is logged in, with their wishlist and cart.
///
/// A session pointing at a deleted account is cleared and reported as
/// logged out.
#[instrument(skip(state, session, user))]
pub async fn current_user_status(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Value>> {
    let Some(current) = user else {
        return Ok(Json(json!({ "logged_in": false })));
    };

    let user = match AuthService::new(state.pool()).get_user(current.id).await {
        Ok(user) => user,
        Err(AuthError::UserNotFound) => {
            tracing::warn!(user_id = %current.id, "Session user no longer exists");
            clear_current_user(&session).await?;
            return Ok(Json(json!({ "logged_in": false })));
        }
        Err(e) => return Err(e.into()),
    };

    let wishlist = WishlistRepository::new(state.pool()).list(user.id).await?;
    let cart: Vec<Value> = CartRepository::new(state.pool())
        .list(user.id)
        .await?
        .into_iter()
        .map(|line| json!({ "product_id": line.product_id, "quantity": line.quantity }))
        .collect();

    let mut user_value = user_json(&user);
    user_value["wishlist"] = json!(wishlist);
    user_value["cart"] = json!(cart);

    Ok(Json(json!({
        "logged_in": true,
        "user": user_value,
    })))
}
