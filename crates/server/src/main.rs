//! ShopSmarter server - recommendation API and account backend.
//!
//! Serves on port 5000 by default.
//!
//! # Architecture
//!
//! - Axum web framework, Askama for the landing page
//! - `SQLite` (sqlx) for accounts, wishlists, carts, preferences and sessions
//! - Product catalog loaded from JSON into memory at startup
//! - ViT (ONNX Runtime) for image embeddings, `OpenAI` for image
//!   descriptions, Gemini for query refinement. Each is optional.

#![cfg_attr(not(test), forbid(unsafe_code))]

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shopsmarter_server::app::build_router;
use shopsmarter_server::catalog::Catalog;
use shopsmarter_server::config::ServerConfig;
use shopsmarter_server::db;
use shopsmarter_server::middleware::create_session_layer;
use shopsmarter_server::recommend::Recommender;
use shopsmarter_server::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Initialize tracing with `EnvFilter` and Sentry integration.
///
/// Defaults to info level for our crate if `RUST_LOG` is not set.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopsmarter_server=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server failed");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pool = db::create_pool(&config.database_url).await?;
    db::migrate(&pool).await?;
    tracing::info!("Database ready");

    let session_store = db::migrate_session_store(&pool).await?;

    let recommender = Recommender::from_config(&config.ai);

    // Embedding missing catalog images runs the model, keep it off the runtime
    let catalog_path = config.paths.catalog_path();
    let data_dir = config.paths.data_dir.clone();
    let embedder = recommender.embedder();
    let catalog = tokio::task::spawn_blocking(move || {
        Catalog::load(&catalog_path, &data_dir, embedder.as_deref())
    })
    .await?;

    let session_layer = create_session_layer(session_store, &config);
    let addr = config.socket_addr();
    let state = AppState::new(config, pool, catalog, recommender);
    let app = build_router(state, session_layer);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("shopsmarter listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

