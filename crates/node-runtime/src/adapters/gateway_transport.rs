//! # Gateway Transport
//!
//! [`P2pTransport`] that hands each round trip to a local P2P HTTP gateway.
//! The gateway owns the libp2p host: dialing, relay circuits and stream
//! multiplexing.
//!
//! ```text
//! {method} {gateway}/p2p/{peer_id}{path}
//! X-P2P-Protocol: /ec-app/1.0
//! X-P2P-Addrs:    <known multiaddrs for the peer, comma separated>
//! <original headers and body>
//! ```
//!
//! The gateway's response status, headers and body are the peer's.

use async_trait::async_trait;
use futures::StreamExt;
use http::{header, HeaderName, HeaderValue};
use reqwest::Client;
use shared_types::{AddressBook, P2pRequest, P2pResponse, P2pTransport, PeerId, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Protocol tag header understood by the gateway.
pub const X_P2P_PROTOCOL: HeaderName = HeaderName::from_static("x-p2p-protocol");
/// Dial hints header understood by the gateway.
pub const X_P2P_ADDRS: HeaderName = HeaderName::from_static("x-p2p-addrs");

pub struct GatewayTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
    address_book: Arc<dyn AddressBook>,
}

impl GatewayTransport {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        address_book: Arc<dyn AddressBook>,
    ) -> Result<Self, TransportError> {
        // Only connect and the response head are bounded; bodies may stream
        // for as long as the peer writes.
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            address_book,
        })
    }

    fn url(&self, peer: &PeerId, path: &str) -> String {
        format!("{}/p2p/{}{}", self.base_url, peer, path)
    }

    fn classify(&self, peer: &PeerId, e: reqwest::Error) -> TransportError {
        if e.is_builder() {
            TransportError::InvalidRequest(e.to_string())
        } else if e.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if e.is_connect() {
            TransportError::Dial {
                peer: peer.to_string(),
                reason: e.to_string(),
            }
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl P2pTransport for GatewayTransport {
    async fn round_trip(
        &self,
        peer: PeerId,
        request: P2pRequest,
    ) -> Result<P2pResponse, TransportError> {
        let mut headers = request.headers;
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let protocol = HeaderValue::from_str(&request.protocol)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        headers.insert(X_P2P_PROTOCOL, protocol);

        let addrs = self
            .address_book
            .addrs(&peer)
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(",");
        if !addrs.is_empty() {
            let addrs = HeaderValue::from_str(&addrs)
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            headers.insert(X_P2P_ADDRS, addrs);
        }

        let url = self.url(&peer, &request.path);
        debug!(peer = %peer, url = %url, "gateway round trip");

        let send = self
            .client
            .request(request.method, &url)
            .headers(headers)
            .body(request.body)
            .send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
            .map_err(|e| self.classify(&peer, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)))
            .boxed();

        Ok(P2pResponse {
            status,
            headers,
            body,
        })
    }
}
