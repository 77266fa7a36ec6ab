//! Recommendation route handlers.

use axum::{
    Json,
    body::Bytes,
    extract::{
        Multipart, State,
        multipart::MultipartError,
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::config::file_extension;
use crate::error::{AppError, Result};
use crate::recommend::ImageQuery;
use crate::recommend::rank::clamp_top_k;
use crate::routes::json_body;
use crate::state::AppState;

/// Text recommendation request body.
#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub prompt: String,
    pub top_k: Option<usize>,
}

/// An image part pulled out of the multipart body.
struct UploadedFile {
    file_name: String,
    bytes: Bytes,
}

/// Recommend products for a text prompt.
#[instrument(skip(state, body))]
pub async fn get_recommendations(
    State(state): State<AppState>,
    body: std::result::Result<Json<RecommendationRequest>, JsonRejection>,
) -> Result<Response> {
    let request = json_body(body)?;

    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::BadRequest("No prompt provided".to_string()));
    }

    let recommendations = state
        .recommender()
        .recommend_for_text(state.catalog(), prompt, clamp_top_k(request.top_k))
        .await;

    Ok(Json(recommendations).into_response())
}

/// Recommend products for an uploaded image.
///
/// Expects a multipart body with an `image` file and optional `prompt` and
/// `top_k` text fields. The file is stored under the upload directory with a
/// random name before any AI call runs.
#[instrument(skip(state, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut image: Option<UploadedFile> = None;
    let mut prompt = String::new();
    let mut top_k = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("image") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                image = Some(UploadedFile { file_name, bytes });
            }
            Some("prompt") => prompt = field.text().await.map_err(multipart_error)?,
            Some("top_k") => {
                top_k = field
                    .text()
                    .await
                    .map_err(multipart_error)?
                    .trim()
                    .parse()
                    .ok();
            }
            _ => {}
        }
    }

    let upload = image.ok_or_else(|| AppError::BadRequest("No image file provided".to_string()))?;
    if upload.file_name.is_empty() || upload.bytes.is_empty() {
        return Err(AppError::BadRequest("No selected file".to_string()));
    }

    let config = state.config();
    let extension = file_extension(&upload.file_name)
        .filter(|_| config.uploads.extension_allowed(&upload.file_name))
        .ok_or_else(|| AppError::BadRequest("File type not allowed".to_string()))?;

    if upload.bytes.len() > config.uploads.max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File exceeds the {} byte upload limit",
            config.uploads.max_bytes
        )));
    }

    let stored_name = format!("{}.{extension}", Uuid::new_v4());
    let upload_dir = config.paths.upload_path();
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create upload dir: {e}")))?;
    tokio::fs::write(upload_dir.join(&stored_name), &upload.bytes)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to save upload: {e}")))?;

    tracing::info!(
        file = %stored_name,
        bytes = upload.bytes.len(),
        has_prompt = !prompt.trim().is_empty(),
        "Image uploaded"
    );

    let query = ImageQuery {
        bytes: upload.bytes,
        mime: mime_for_extension(&extension),
        prompt: prompt.trim().to_string(),
        uploaded_image_url: config.paths.upload_url(&stored_name),
    };

    let recommendations = state
        .recommender()
        .recommend_for_image(state.catalog(), query, clamp_top_k(top_k))
        .await;

    Ok(Json(recommendations).into_response())
}

/// Map multipart failures, keeping the 413 the body limit produces.
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File exceeds the upload limit".to_string())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Content type sent to the vision API.
fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
