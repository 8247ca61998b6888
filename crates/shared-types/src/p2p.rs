//! # P2P Collaborator Ports
//!
//! The proxy and the pool never touch the libp2p host directly. They consume
//! three capabilities:
//!
//! | Port | Purpose |
//! |------|---------|
//! | `PeerDirectory` | node ID → [`AppPeer`] lookup |
//! | `AddressBook` | register dialable addresses with a TTL |
//! | `P2pTransport` | protocol-tagged request/response to a peer |
//!
//! Dial and request timeouts are owned by the transport implementation.

use crate::entities::AppPeer;
use crate::errors::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use http::{HeaderMap, Method, StatusCode};
use libp2p_identity::PeerId;
use multiaddr::Multiaddr;
use std::time::Duration;

/// Application protocol tag negotiated with edge application peers.
pub const PROTO_TAG_EC_APP: &str = "/ec-app/1.0";

/// Well-known path on the target peer that receives forwarded HTTP calls.
pub const TRANSPARENT_FORWARD_URL: &str = "/transparent_forward";

/// TTL for addresses learned from the directory just before dialing.
pub const RECENTLY_CONNECTED_ADDR_TTL: Duration = Duration::from_secs(15 * 60);

/// Streamed response body.
pub type BodyStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Lookup capability over the peer directory.
pub trait PeerDirectory: Send + Sync {
    /// Returns how `node_id` can be reached, if it is known.
    fn app_peer(&self, node_id: &str) -> Option<AppPeer>;
}

/// The local host's peer store.
pub trait AddressBook: Send + Sync {
    /// Add addresses for `peer`, valid for `ttl`.
    fn add_addrs(&self, peer: PeerId, addrs: Vec<Multiaddr>, ttl: Duration);

    /// Addresses currently known (and not expired) for `peer`.
    fn addrs(&self, peer: &PeerId) -> Vec<Multiaddr>;
}

/// An HTTP-shaped request sent over a P2P stream.
#[derive(Debug, Clone)]
pub struct P2pRequest {
    /// Protocol tag used to open the stream.
    pub protocol: String,
    pub method: Method,
    /// Path on the remote peer, e.g. [`TRANSPARENT_FORWARD_URL`].
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl P2pRequest {
    /// A request on the edge application protocol.
    pub fn ec_app(method: Method, path: impl Into<String>) -> Self {
        Self {
            protocol: PROTO_TAG_EC_APP.to_string(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Response head plus a streamed body.
pub struct P2pResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl std::fmt::Debug for P2pResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P2pResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl P2pResponse {
    /// Drain the body into memory, failing once `limit` bytes are exceeded.
    pub async fn collect_body(self, limit: usize) -> Result<Bytes, TransportError> {
        use futures::StreamExt;

        let mut body = self.body;
        let mut collected = bytes::BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| TransportError::Request(e.to_string()))?;
            if collected.len() + chunk.len() > limit {
                return Err(TransportError::Request(format!(
                    "response exceeds {} bytes",
                    limit
                )));
            }
            collected.extend_from_slice(&chunk);
        }
        Ok(collected.freeze())
    }
}

/// Outbound P2P calls.
#[async_trait]
pub trait P2pTransport: Send + Sync {
    /// Open a stream to `peer` on `request.protocol` and exchange one
    /// request/response pair.
    async fn round_trip(
        &self,
        peer: PeerId,
        request: P2pRequest,
    ) -> Result<P2pResponse, TransportError>;
}
