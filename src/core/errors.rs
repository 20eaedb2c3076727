// src/core/errors.rs

//! Defines the primary error type for the entire application.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the proxy.
/// Using `thiserror` allows for clean error definitions and automatic `From`
/// trait implementations. The router translates each variant to an HTTP
/// status and writes the rendered message as the response body.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// The URL does not fit any known request shape, or contains characters
    /// the path codec rejects.
    #[error("{0}")]
    BadRequest(String),

    /// The module or version does not exist, or the version is not acceptable
    /// for the requested kind.
    #[error("{0}")]
    NotFound(String),

    /// The requested checksum database is not in the allow-list.
    #[error("unsupported db")]
    SumDbUnsupported,

    /// No sumdb mirror produced a response within the shared deadline.
    #[error("sumdb fetch failed: {0}")]
    SumDbUnavailable(String),

    /// The upstream returned a transport-level failure, a broken redirect,
    /// or an undecodable body.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("origin resolver error: {0}")]
    Resolver(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// Declares the module or version missing, formatting the message the way
    /// the toolchain reports it.
    pub fn not_found(msg: impl Into<String>) -> Self {
        ProxyError::NotFound(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::SumDbUnsupported | ProxyError::SumDbUnavailable(_) => StatusCode::GONE,
            ProxyError::Io(_)
            | ProxyError::Upstream(_)
            | ProxyError::HttpClient(_)
            | ProxyError::Resolver(_)
            | ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for ProxyError {
    fn from(e: std::io::Error) -> Self {
        ProxyError::Io(Arc::new(e))
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        ProxyError::HttpClient(e.to_string())
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(e: serde_json::Error) -> Self {
        ProxyError::Internal(format!("JSON serialization/deserialization error: {e}"))
    }
}
