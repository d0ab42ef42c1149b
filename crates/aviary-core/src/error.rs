//! Error types for aviary-core

use http::StatusCode;
use thiserror::Error;

/// Result type for aviary-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy per the dispatch engine's error handling design.
///
/// Each variant carries enough context to classify the failure (validation,
/// auth, rate-limit, transient vs. permanent upstream, local-fatal) without
/// relying on string matching downstream.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config not found. Searched: {searched:?}")]
    ConfigNotFound { searched: Vec<std::path::PathBuf> },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization denied: {0}")]
    Authorization(String),

    #[error("Rate limit exceeded: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Secret resolution failed for provider '{provider}': {message}")]
    Secret { provider: String, message: String },

    #[error("No secret provider can handle reference scheme '{scheme}'")]
    NoSecretProvider { scheme: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Upstream transient error ({source}): {message}")]
    UpstreamTransient { source: String, message: String },

    #[error("Upstream permanent error ({source}): {message}")]
    UpstreamPermanent { source: String, message: String },

    #[error("Local fatal error: {0}")]
    LocalFatal(String),

    #[error("Invalid cron expression for provider '{provider}': {message}")]
    InvalidCron { provider: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Map an error to the HTTP status code the webhook server should return.
    /// Keeps HTTP concerns out of the core error type itself; the API layer
    /// does the translation.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Error::Validation(_)
            | Error::ConfigParse { .. }
            | Error::Json(_)
            | Error::Template(_) => StatusCode::BAD_REQUEST,
            Error::Authentication(_) => StatusCode::UNAUTHORIZED,
            Error::Authorization(_) => StatusCode::FORBIDDEN,
            Error::UnknownProvider(_) | Error::UnknownAccount(_) => StatusCode::BAD_REQUEST,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::UpstreamPermanent { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}
