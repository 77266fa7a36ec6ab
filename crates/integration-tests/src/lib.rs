//! Integration tests for ShopSmarter.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopsmarter-integration-tests
//! ```
//!
//! Tests drive the real router in-process with `tower::ServiceExt::oneshot`.
//! Each [`TestApp`] gets its own in-memory `SQLite` database, in-memory
//! session store and temporary data directory. No hosted AI API is
//! configured, so nothing leaves the process.
//!
//! # Test Categories
//!
//! - `health` - Liveness, readiness, landing page, request ids
//! - `auth_flow` - Signup, login, logout, session status
//! - `account` - Wishlist, cart, checkout, preferences
//! - `recommendations` - Text and image recommendation routes

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use image::DynamicImage;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use shopsmarter_server::ai::AiError;
use shopsmarter_server::ai::vision::ImageEmbedder;
use shopsmarter_server::app::build_router;
use shopsmarter_server::catalog::{Catalog, Product};
use shopsmarter_server::config::{AiConfig, PathsConfig, ServerConfig, UploadConfig};
use shopsmarter_server::db;
use shopsmarter_server::middleware::{SESSION_COOKIE_NAME, create_session_layer};
use shopsmarter_server::recommend::Recommender;
use shopsmarter_server::state::AppState;

/// Upload limit used by test apps.
pub const TEST_MAX_UPLOAD_BYTES: usize = 256 * 1024;

const MULTIPART_BOUNDARY: &str = "shopsmarter-test-boundary";

/// Embedder that returns the same vector for every image.
pub struct FixedEmbedder(pub Vec<f32>);

impl ImageEmbedder for FixedEmbedder {
    fn embed(&self, _image: &DynamicImage) -> Result<Vec<f32>, AiError> {
        Ok(self.0.clone())
    }
}

/// A small catalog with embeddings and prices.
#[must_use]
pub fn fixture_products() -> Value {
    serde_json::json!([
        {
            "id": "1001", "name": "Navy Linen Shirt", "price": "$49.99",
            "description": "Breathable linen shirt for summer.", "type": "Shirts",
            "category": "Apparel", "style": "Casual", "color_tags": ["navy"],
            "images": ["/static/product_images_db/1001.jpg"], "embedding": [1.0, 0.0, 0.0]
        },
        {
            "id": "1002", "name": "Red Floral Dress", "price": "$79.50",
            "description": "Light floral dress.", "type": "Dresses",
            "category": "Apparel", "style": "Casual", "color_tags": ["red"],
            "images": ["/static/product_images_db/1002.jpg"], "embedding": [0.0, 1.0, 0.0]
        },
        {
            "id": 1003, "name": "Black Leather Boots", "price": "$120.00",
            "description": "Ankle boots in black leather.", "type": "Boots",
            "category": "Footwear", "color_tags": ["black"],
            "embedding": [0.0, 0.0, 1.0]
        },
        {
            "id": "1004", "name": "Red Canvas Sneakers",
            "description": "Low-top canvas sneakers.", "type": "Casual Shoes",
            "category": "Footwear", "color_tags": ["red"]
        }
    ])
}

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    /// Parse the body as JSON.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "response body is not JSON ({e}): {}",
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    /// The body as text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One multipart form part.
pub enum Part<'a> {
    Text { name: &'a str, value: &'a str },
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

/// An in-process server with a cookie jar holding one session cookie.
pub struct TestApp {
    router: Router,
    pub pool: sqlx::SqlitePool,
    pub data_dir: tempfile::TempDir,
    cookie: Option<String>,
}

impl TestApp {
    /// App with an empty catalog and no vision model.
    ///
    /// # Panics
    ///
    /// Panics if the database or temp dir cannot be created.
    pub async fn new() -> Self {
        Self::build(serde_json::json!([]), None).await
    }

    /// App with the fixture catalog and a fixed-vector embedder.
    ///
    /// # Panics
    ///
    /// Panics if the database or temp dir cannot be created.
    pub async fn with_catalog(embedder: Option<Vec<f32>>) -> Self {
        Self::build(fixture_products(), embedder).await
    }

    async fn build(products: Value, embedding: Option<Vec<f32>>) -> Self {
        let data_dir = tempfile::tempdir().expect("temp data dir");
        let config = test_config(data_dir.path());

        let pool = db::create_pool(&config.database_url)
            .await
            .expect("in-memory pool");
        db::migrate(&pool).await.expect("migrations");

        let products: Vec<Product> = serde_json::from_value(products).expect("fixture catalog");
        let catalog = Catalog::new(products);

        let embedder =
            embedding.map(|v| Arc::new(FixedEmbedder(v)) as Arc<dyn ImageEmbedder>);
        let recommender = Recommender::new(embedder, None, None);

        let session_layer = create_session_layer(MemoryStore::default(), &config);
        let state = AppState::new(config, pool.clone(), catalog, recommender);
        let router = build_router(state, session_layer);

        Self {
            router,
            pool,
            data_dir,
            cookie: None,
        }
    }

    /// Whether the jar holds a session cookie.
    #[must_use]
    pub const fn has_session_cookie(&self) -> bool {
        self.cookie.is_some()
    }

    /// Send a request, attaching and updating the session cookie.
    ///
    /// # Panics
    ///
    /// Panics if the router fails or the body cannot be read.
    pub async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            request.headers_mut().insert(
                header::COOKIE,
                cookie.parse().expect("cookie header value"),
            );
        }

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        for value in response.headers().get_all(header::SET_COOKIE) {
            self.store_cookie(value.to_str().expect("ascii set-cookie"));
        }

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");

        TestResponse {
            status,
            headers,
            body,
        }
    }

    fn store_cookie(&mut self, set_cookie: &str) {
        let pair = set_cookie.split(';').next().unwrap_or_default().trim();
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        if name != SESSION_COOKIE_NAME {
            return;
        }
        let expired = set_cookie.to_ascii_lowercase().contains("max-age=0");
        self.cookie = (!value.is_empty() && !expired).then(|| pair.to_string());
    }

    /// `GET` a path.
    pub async fn get(&mut self, path: &str) -> TestResponse {
        let request = Request::builder()
            .uri(path)
            .body(Body::empty())
            .expect("request");
        self.send(request).await
    }

    /// Send a JSON body with the given method.
    pub async fn json(&mut self, method: Method, path: &str, body: &Value) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        self.send(request).await
    }

    /// `POST` a JSON body.
    pub async fn post_json(&mut self, path: &str, body: &Value) -> TestResponse {
        self.json(Method::POST, path, body).await
    }

    /// `POST` with no body.
    pub async fn post_empty(&mut self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .body(Body::empty())
            .expect("request");
        self.send(request).await
    }

    /// `POST` a multipart form.
    pub async fn post_multipart(&mut self, path: &str, parts: &[Part<'_>]) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .expect("request");
        self.send(request).await
    }

    /// Sign up and keep the session.
    ///
    /// # Panics
    ///
    /// Panics if signup does not return 201.
    pub async fn signup(&mut self, username: &str, password: &str) -> Value {
        let response = self
            .post_json(
                "/api/signup",
                &serde_json::json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()
    }
}

fn test_config(data_dir: &Path) -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("sqlite::memory:"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost".to_string(),
        session_secret: SecretString::from(
            "q7Zr2mXv9Lw4Kp8Ts1Nd6Hf3Bj5Gc0Ye-integration-only-Xa2Wk",
        ),
        paths: PathsConfig {
            data_dir: data_dir.to_path_buf(),
            catalog_file: "catalog.json".into(),
            upload_dir: "static/uploads".into(),
        },
        uploads: UploadConfig {
            max_bytes: TEST_MAX_UPLOAD_BYTES,
            allowed_extensions: ["png", "jpg", "jpeg", "gif", "webp"]
                .map(String::from)
                .to_vec(),
        },
        ai: AiConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

/// A small PNG.
///
/// # Panics
///
/// Panics if encoding fails.
#[must_use]
pub fn png_bytes() -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::new_rgb8(8, 8)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("encode png");
    buf
}
