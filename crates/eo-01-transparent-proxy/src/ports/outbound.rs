//! Outbound ports: the authorization capability and its backends.
//!
//! The auth chain depends only on [`Authorizer`]. The two variants live in
//! `adapters::authorizers` and are built from a [`BearerStore`] (boolean
//! mode) or a [`TokenExchange`] (exchange mode).

use crate::domain::{AuthError, EdgePath};
use async_trait::async_trait;

/// Outcome of a successful authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// Forward the request as is.
    Accepted,
    /// Replace the inbound bearer with this upstream token.
    Exchanged(String),
}

/// Decides whether a bearer may reach the addressed edge application.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, bearer: &str, edge_path: &EdgePath) -> Result<Grant, AuthError>;
}

/// Boolean bearer validation.
pub trait BearerStore: Send + Sync {
    fn validate_bearer(&self, bearer: &str) -> bool;
}

/// Exchanges an API key for an upstream token scoped to one node and port.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// `Ok(None)` means the key was checked and refused.
    async fn exchange(
        &self,
        api_key: &str,
        node_id: &str,
        port: u16,
    ) -> Result<Option<String>, AuthError>;
}
