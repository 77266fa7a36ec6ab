//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPSMARTER_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `SHOPSMARTER_DATABASE_URL` - SQLite URL (falls back to `DATABASE_URL`,
//!   then `sqlite://shopsmarter.sqlite3`)
//! - `SHOPSMARTER_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOPSMARTER_PORT` - Listen port (default: 5000)
//! - `SHOPSMARTER_BASE_URL` - Public URL (default: `http://localhost:5000`)
//! - `SHOPSMARTER_DATA_DIR` - Root for the catalog, images and uploads (default: `.`)
//! - `SHOPSMARTER_CATALOG_FILE` - Catalog JSON, relative to the data dir
//!   (default: `curated_product_catalog.json`)
//! - `SHOPSMARTER_UPLOAD_DIR` - Upload folder, relative to the data dir and
//!   under `static/` so uploads are served back (default: `static/uploads`)
//! - `SHOPSMARTER_MAX_UPLOAD_BYTES` - Upload size limit (default: 16 MiB)
//! - `SHOPSMARTER_ALLOWED_EXTENSIONS` - Comma separated (default: `png,jpg,jpeg,gif,webp`)
//! - `SHOPSMARTER_VIT_MODEL_PATH` - ONNX export of `google/vit-base-patch16-224-in21k`
//! - `OPENAI_API_KEY`, `OPENAI_VISION_MODEL` (default: `gpt-4o`)
//! - `GOOGLE_API_KEY`, `GEMINI_MODEL` (default: `gemini-1.5-flash-latest`)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Sentry error tracking

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_ALLOWED_EXTENSIONS: &str = "png,jpg,jpeg,gif,webp";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "default",
    "xxx",
    "todo",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// SQLite connection URL
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, decides whether session cookies are `Secure`
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Catalog, static and upload locations
    pub paths: PathsConfig,
    /// Upload validation limits
    pub uploads: UploadConfig,
    /// Model and hosted API settings
    pub ai: AiConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Filesystem layout.
#[derive(Debug, Clone)]
pub struct PathsConfig {
    /// Root that relative catalog image paths resolve against
    pub data_dir: PathBuf,
    /// Catalog JSON file, relative to `data_dir`
    pub catalog_file: PathBuf,
    /// Upload folder, relative to `data_dir`
    pub upload_dir: PathBuf,
}

impl PathsConfig {
    /// Read the catalog and upload locations from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            data_dir: PathBuf::from(get_env_or_default("SHOPSMARTER_DATA_DIR", ".")),
            catalog_file: PathBuf::from(get_env_or_default(
                "SHOPSMARTER_CATALOG_FILE",
                "curated_product_catalog.json",
            )),
            upload_dir: PathBuf::from(get_env_or_default(
                "SHOPSMARTER_UPLOAD_DIR",
                "static/uploads",
            )),
        }
    }

    /// Absolute-or-cwd-relative path to the catalog file.
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join(&self.catalog_file)
    }

    /// Directory served under `/static`.
    #[must_use]
    pub fn static_dir(&self) -> PathBuf {
        self.data_dir.join("static")
    }

    /// Directory uploads are written to.
    #[must_use]
    pub fn upload_path(&self) -> PathBuf {
        self.data_dir.join(&self.upload_dir)
    }

    /// Public URL for an uploaded file name.
    #[must_use]
    pub fn upload_url(&self, file_name: &str) -> String {
        let dir = self.upload_dir.to_string_lossy().replace('\\', "/");
        format!("/{}/{file_name}", dir.trim_matches('/'))
    }
}

/// Upload validation limits.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum accepted image size in bytes
    pub max_bytes: usize,
    /// Lowercased file extensions without the dot
    pub allowed_extensions: Vec<String>,
}

impl UploadConfig {
    /// Whether a file name carries an allowed extension.
    #[must_use]
    pub fn extension_allowed(&self, file_name: &str) -> bool {
        file_extension(file_name)
            .is_some_and(|ext| self.allowed_extensions.iter().any(|allowed| *allowed == ext))
    }
}

/// Lowercased extension of a file name, if it has one.
#[must_use]
pub fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Vision model and hosted API settings.
#[derive(Debug, Clone, Default)]
pub struct AiConfig {
    /// ONNX ViT export; visual search is disabled when unset
    pub vit_model_path: Option<PathBuf>,
    /// OpenAI vision description, skipped when unset
    pub openai: Option<HostedModelConfig>,
    /// Gemini search refinement, skipped when unset
    pub gemini: Option<HostedModelConfig>,
}

/// Credentials and model name for a hosted API.
///
/// Implements `Debug` manually to redact the key.
#[derive(Clone)]
pub struct HostedModelConfig {
    /// API key
    pub api_key: SecretString,
    /// Model identifier sent with each request
    pub model: String,
}

impl std::fmt::Debug for HostedModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedModelConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the session secret is missing or weak, or
    /// if a numeric/address variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("SHOPSMARTER_DATABASE_URL");
        let host = parse_env("SHOPSMARTER_HOST", "127.0.0.1")?;
        let port = parse_env("SHOPSMARTER_PORT", "5000")?;
        let base_url = get_env_or_default("SHOPSMARTER_BASE_URL", "http://localhost:5000");
        let session_secret = get_validated_secret("SHOPSMARTER_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "SHOPSMARTER_SESSION_SECRET")?;

        let paths = PathsConfig::from_env();

        let uploads = UploadConfig {
            max_bytes: parse_env(
                "SHOPSMARTER_MAX_UPLOAD_BYTES",
                &DEFAULT_MAX_UPLOAD_BYTES.to_string(),
            )?,
            allowed_extensions: parse_extensions(&get_env_or_default(
                "SHOPSMARTER_ALLOWED_EXTENSIONS",
                DEFAULT_ALLOWED_EXTENSIONS,
            )),
        };

        let ai = AiConfig::from_env();

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            paths,
            uploads,
            ai,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the public URL is served over TLS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl AiConfig {
    /// Read model paths and API keys, leaving unset ones as `None`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            vit_model_path: get_optional_env("SHOPSMARTER_VIT_MODEL_PATH").map(PathBuf::from),
            openai: hosted_model("OPENAI_API_KEY", "OPENAI_VISION_MODEL", "gpt-4o"),
            gemini: hosted_model("GOOGLE_API_KEY", "GEMINI_MODEL", "gemini-1.5-flash-latest"),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Build a hosted model config if its key is set.
fn hosted_model(key_var: &str, model_var: &str, default_model: &str) -> Option<HostedModelConfig> {
    let api_key = get_optional_env(key_var)?;
    Some(HostedModelConfig {
        api_key: SecretString::from(api_key),
        model: get_env_or_default(model_var, default_model),
    })
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`, then a local file.
/// Database URL for tools that do not need the full server configuration.
///
/// Loads `.env` like [`ServerConfig::from_env`].
#[must_use]
pub fn database_url_from_env() -> SecretString {
    let _ = dotenvy::dotenv();
    get_database_url("SHOPSMARTER_DATABASE_URL")
}

fn get_database_url(primary_key: &str) -> SecretString {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_or_else(
            |_| SecretString::from("sqlite://shopsmarter.sqlite3"),
            SecretString::from,
        )
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma separated extension list, dropping dots and blanks.
fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
