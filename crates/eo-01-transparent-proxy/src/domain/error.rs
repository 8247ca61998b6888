//! Proxy error types and their HTTP mapping.
//!
//! | Error | Status |
//! |-------|--------|
//! | `InvalidPath`, `InvalidHeader`, `Body`, `InvalidEnvelope` | 400 |
//! | `Unauthorized` | 401 |
//! | `MethodNotAllowed` | 501 |
//! | `Resolve` (not found / no address) | 503 |
//! | `Resolve` (bad multiaddress), `Internal` | 500 |
//! | `Transport` (request construction) | 500 |
//! | `Transport` (dial, request, timeout) | 502 |
//! | `App` (local application unreachable) | 502 |
//!
//! Bodies are plain text.

use super::edge_path::EdgePathError;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use shared_types::{ResolveError, TransportError};
use thiserror::Error;

/// Errors that end a proxied request.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    InvalidPath(#[from] EdgePathError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("invalid forward envelope: {0}")]
    InvalidEnvelope(String),

    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to connect to target server: {0}")]
    App(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPath(_)
            | Self::InvalidHeader(_)
            | Self::Body(_)
            | Self::InvalidEnvelope(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MethodNotAllowed(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Resolve(ResolveError::InvalidAddress { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Resolve(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Transport(e) if e.is_construction_failure() => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Transport(_) | Self::App(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Failures reported by an authorizer. All of them end in 401.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The credential was checked and refused.
    #[error("credential rejected")]
    Rejected,

    /// The exchange service answered with an error code.
    #[error("token exchange failed: {0}")]
    Exchange(String),

    /// The exchange service could not be reached or answered garbage.
    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}
