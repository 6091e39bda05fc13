//! Error types for the proxy.
//!
//! Upstream failures are deliberately reduced to generic messages before they
//! reach the client so nothing about the notes server leaks into responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type Result<T> = std::result::Result<T, Error>;

/// Proxy error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A setting required to serve the request is missing.
    #[error("missing configuration: {0}")]
    Config(&'static str),

    /// The upstream server could not be contacted (connection error or timeout).
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// The upstream server reported a failure or the item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was rejected by an access rule.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Reading or writing the resource cache failed.
    #[error("cache error: {0}")]
    Cache(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::Cache(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            Self::Config(setting) => {
                tracing::error!(%setting, "server configuration incomplete");
                "Server misconfigured".to_string()
            }
            Self::UpstreamUnreachable(error) => {
                tracing::warn!(%error, "upstream unreachable");
                "Bad Gateway: failed to contact notes server".to_string()
            }
            Self::NotFound(what) => {
                tracing::debug!(%what, "not found");
                "Not found".to_string()
            }
            Self::Forbidden(reason) => format!("Forbidden: {reason}"),
            Self::Cache(error) => {
                tracing::error!(%error, "resource cache failure");
                "Internal error".to_string()
            }
            Self::Internal(error) => {
                tracing::error!(%error, "internal server error");
                "Internal error".to_string()
            }
        };

        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}
