//! The two [`Authorizer`] variants.

use crate::domain::{AuthError, EdgePath};
use crate::ports::{Authorizer, BearerStore, Grant, TokenExchange};
use async_trait::async_trait;
use std::sync::Arc;

/// Accepts a bearer the store recognises. The bearer is forwarded unchanged.
pub struct BooleanValidator {
    store: Arc<dyn BearerStore>,
}

impl BooleanValidator {
    pub fn new(store: Arc<dyn BearerStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Authorizer for BooleanValidator {
    async fn authorize(&self, bearer: &str, _edge_path: &EdgePath) -> Result<Grant, AuthError> {
        if self.store.validate_bearer(bearer) {
            Ok(Grant::Accepted)
        } else {
            Err(AuthError::Rejected)
        }
    }
}

/// Exchanges the bearer for a token scoped to the addressed node and port.
///
/// Root requests address no node, so nothing is exchanged for them.
pub struct ExchangingValidator {
    exchange: Arc<dyn TokenExchange>,
}

impl ExchangingValidator {
    pub fn new(exchange: Arc<dyn TokenExchange>) -> Self {
        Self { exchange }
    }
}

#[async_trait]
impl Authorizer for ExchangingValidator {
    async fn authorize(&self, bearer: &str, edge_path: &EdgePath) -> Result<Grant, AuthError> {
        if edge_path.is_root() {
            return Ok(Grant::Accepted);
        }

        match self
            .exchange
            .exchange(bearer, &edge_path.node_id, edge_path.port)
            .await?
        {
            Some(token) if !token.is_empty() => Ok(Grant::Exchanged(token)),
            _ => Err(AuthError::Rejected),
        }
    }
}
