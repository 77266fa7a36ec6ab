//! User preference handlers.
//!
//! Preferences are an opaque JSON object owned by the front end.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::{Value, json};
use tracing::instrument;

use crate::db::preferences::PreferencesRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::routes::json_body;
use crate::state::AppState;

/// Return the stored preferences (`{}` when none were saved).
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>> {
    let preferences = PreferencesRepository::new(state.pool()).get(user.id).await?;
    Ok(Json(json!({ "preferences": preferences })))
}

/// Replace the stored preferences with the body, which must be an object.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>> {
    let Value::Object(preferences) = json_body(body)? else {
        return Err(AppError::BadRequest(
            "Preferences must be a JSON object".to_string(),
        ));
    };

    PreferencesRepository::new(state.pool())
        .set(user.id, &preferences)
        .await?;

    Ok(Json(json!({
        "message": "Preferences updated",
        "preferences": preferences,
    })))
}
