//! # Edge Authorization Chain
//!
//! Runs for every request except `OPTIONS`:
//!
//! 1. append `Forwarded: proto=p2phttp; host=<host>; for=<remote>`
//! 2. decode the [`EdgePath`] (400 on failure)
//! 3. with an authorizer: extract the bearer (401 if missing or malformed),
//!    authorize it (401 on failure) and, for an exchanged grant, replace
//!    `Authorization` with the upstream token
//! 4. attach `X-Forwarded-Host`, `X-Forwarded-EdgePort`,
//!    `X-Forwarded-NodeID` and `X-Forwarded-Interface`
//!
//! Without an authorizer step 3 is skipped; the output is the same
//! [`AdmittedRequest`] either way.

use crate::domain::{
    EdgePath, ProxyError, FORWARDED_PROTO, X_FORWARDED_EDGE_PORT, X_FORWARDED_HOST,
    X_FORWARDED_INTERFACE, X_FORWARDED_NODE_ID,
};
use crate::ports::{Authorizer, Grant};
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderValue, Request};
use shared_types::PeerId;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// A request that passed the chain, with its decoded address.
#[derive(Debug)]
pub struct AdmittedRequest {
    pub edge_path: EdgePath,
    pub request: Request<Body>,
}

/// Authorization and annotation in front of the bridge.
pub struct EdgeAuthChain {
    authorizer: Option<Arc<dyn Authorizer>>,
    local_peer: PeerId,
}

impl EdgeAuthChain {
    pub fn new(authorizer: Option<Arc<dyn Authorizer>>, local_peer: PeerId) -> Self {
        Self {
            authorizer,
            local_peer,
        }
    }

    /// Chain without authorization.
    pub fn unauthenticated(local_peer: PeerId) -> Self {
        Self::new(None, local_peer)
    }

    pub fn requires_auth(&self) -> bool {
        self.authorizer.is_some()
    }

    pub async fn admit(&self, mut request: Request<Body>) -> Result<AdmittedRequest, ProxyError> {
        append_forwarded(&mut request);

        let edge_path = EdgePath::parse(request.uri().path()).map_err(|e| {
            debug!(path = %request.uri().path(), error = %e, "rejecting malformed edge path");
            ProxyError::from(e)
        })?;

        if let Some(authorizer) = &self.authorizer {
            let bearer = extract_bearer(request.headers()).ok_or_else(|| {
                warn!(node_id = %edge_path.node_id, "missing or malformed bearer");
                ProxyError::Unauthorized
            })?;

            match authorizer.authorize(&bearer, &edge_path).await {
                Ok(Grant::Accepted) => {}
                Ok(Grant::Exchanged(token)) => {
                    let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(
                        |_| ProxyError::Internal("exchanged token is not a header value".into()),
                    )?;
                    request.headers_mut().insert(header::AUTHORIZATION, value);
                }
                Err(e) => {
                    warn!(node_id = %edge_path.node_id, error = %e, "authorization failed");
                    return Err(ProxyError::Unauthorized);
                }
            }
        }

        let annotations = [
            (X_FORWARDED_HOST, self.local_peer.to_string(), "X-Forwarded-Host"),
            (X_FORWARDED_EDGE_PORT, edge_path.port.to_string(), "X-Forwarded-EdgePort"),
            (X_FORWARDED_NODE_ID, edge_path.node_id.clone(), "X-Forwarded-NodeID"),
            (X_FORWARDED_INTERFACE, edge_path.interface_url.clone(), "X-Forwarded-Interface"),
        ];
        for (name, value, display) in annotations {
            let value =
                HeaderValue::from_str(&value).map_err(|_| ProxyError::InvalidHeader(display))?;
            request.headers_mut().insert(name, value);
        }

        Ok(AdmittedRequest { edge_path, request })
    }
}

/// `Bearer <token>` from the `Authorization` header.
///
/// The header must split on a single space into exactly two parts.
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Some(token.to_string()),
        _ => None,
    }
}

fn append_forwarded(request: &mut Request<Body>) {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_default();

    let forwarded = format!("proto={}; host={}; for={}", FORWARDED_PROTO, host, remote);
    if let Ok(value) = HeaderValue::from_str(&forwarded) {
        request.headers_mut().append(header::FORWARDED, value);
    }
}
