//! Landing page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use crate::middleware::OptionalAuth;
use crate::recommend::rank::{DEFAULT_TOP_K, MAX_TOP_K};
use crate::state::AppState;

/// Landing page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub username: Option<String>,
    pub product_count: usize,
    pub visual_search: bool,
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub allowed_extensions: String,
}

/// Display the landing page.
#[instrument(skip(state, user))]
pub async fn index(State(state): State<AppState>, OptionalAuth(user): OptionalAuth) -> IndexTemplate {
    let catalog = state.catalog();

    IndexTemplate {
        username: user.map(|u| u.username.to_string()),
        product_count: catalog.len(),
        visual_search: state.recommender().embedder().is_some() && catalog.embedded_count() > 0,
        default_top_k: DEFAULT_TOP_K,
        max_top_k: MAX_TOP_K,
        allowed_extensions: state.config().uploads.allowed_extensions.join(", "),
    }
}
