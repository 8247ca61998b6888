//! # HTTP ↔ P2P Bridge
//!
//! Takes an [`AdmittedRequest`] and relays it to the addressed edge node.
//!
//! | Request | Outcome |
//! |---------|---------|
//! | `GET` on the root path | status JSON |
//! | `GET` / `POST` to a node | forwarded to `/transparent_forward` |
//! | anything else | 501 |
//!
//! The upstream status and headers are relayed, except
//! `Access-Control-Allow-Origin` (owned by the CORS layer) and hop-by-hop
//! framing headers. `text/event-stream` bodies are re-chunked so every line
//! goes out as its own frame; other bodies stream through untouched.

use crate::domain::{ProxyError, StatusResponse, TransparentForward};
use crate::middleware::AdmittedRequest;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Response};
use axum::response::IntoResponse;
use axum::Json;
use bytes::BytesMut;
use futures::{Stream, StreamExt};
use shared_types::{
    register_peer_route, AddressBook, BodyStream, P2pRequest, P2pTransport, PeerDirectory,
    TRANSPARENT_FORWARD_URL,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Content type that switches the relay to line-by-line streaming.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Relays admitted requests over the P2P transport.
pub struct Bridge {
    directory: Arc<dyn PeerDirectory>,
    address_book: Arc<dyn AddressBook>,
    transport: Arc<dyn P2pTransport>,
    status: StatusResponse,
    max_request_size: usize,
    legacy_envelope: bool,
}

impl Bridge {
    pub fn new(
        directory: Arc<dyn PeerDirectory>,
        address_book: Arc<dyn AddressBook>,
        transport: Arc<dyn P2pTransport>,
        status: StatusResponse,
        max_request_size: usize,
    ) -> Self {
        Self {
            directory,
            address_book,
            transport,
            status,
            max_request_size,
            legacy_envelope: false,
        }
    }

    /// Wrap forwarded bodies in the [`TransparentForward`] JSON envelope.
    pub fn with_legacy_envelope(mut self, enabled: bool) -> Self {
        self.legacy_envelope = enabled;
        self
    }

    pub async fn handle(&self, admitted: AdmittedRequest) -> Response<Body> {
        let method = admitted.request.method().clone();
        match method {
            Method::GET if admitted.edge_path.is_root() => {
                Json(self.status.clone()).into_response()
            }
            Method::GET | Method::POST => match self.forward(admitted).await {
                Ok(response) => response,
                Err(e) => e.into_response(),
            },
            other => ProxyError::MethodNotAllowed(other).into_response(),
        }
    }

    async fn forward(&self, admitted: AdmittedRequest) -> Result<Response<Body>, ProxyError> {
        let AdmittedRequest { edge_path, request } = admitted;
        let node_id = edge_path.node_id.clone();

        let route = register_peer_route(
            self.directory.as_ref(),
            self.address_book.as_ref(),
            &node_id,
        )
        .map_err(|e| {
            warn!(node_id = %node_id, error = %e, "peer resolution failed");
            ProxyError::from(e)
        })?;

        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, self.max_request_size)
            .await
            .map_err(|e| ProxyError::Body(e.to_string()))?;

        let body = if self.legacy_envelope {
            let envelope = TransparentForward {
                edge_path,
                payload: String::from_utf8_lossy(&body).into_owned(),
            };
            Bytes::from(
                serde_json::to_vec(&envelope).map_err(|e| ProxyError::Internal(e.to_string()))?,
            )
        } else {
            body
        };

        let outbound = P2pRequest::ec_app(parts.method, TRANSPARENT_FORWARD_URL)
            .with_headers(parts.headers)
            .with_body(body);

        debug!(node_id = %node_id, addr = %route.addr, "forwarding edge request");
        let upstream = self
            .transport
            .round_trip(route.peer_id, outbound)
            .await
            .map_err(|e| {
                warn!(
                    node_id = %node_id,
                    url = %format!("libp2p://{}{}", node_id, TRANSPARENT_FORWARD_URL),
                    error = %e,
                    "p2p round trip failed"
                );
                ProxyError::from(e)
            })?;

        let streaming = is_event_stream(&upstream.headers);
        let mut response = Response::new(if streaming {
            Body::from_stream(event_stream_lines(upstream.body, node_id))
        } else {
            Body::from_stream(upstream.body)
        });
        *response.status_mut() = upstream.status;
        copy_upstream_headers(&upstream.headers, response.headers_mut());

        Ok(response)
    }
}

/// True if the upstream declares a server-sent event stream.
pub fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().starts_with(EVENT_STREAM))
        .unwrap_or(false)
}

fn copy_upstream_headers(upstream: &HeaderMap, out: &mut HeaderMap) {
    for (name, value) in upstream {
        if name == header::ACCESS_CONTROL_ALLOW_ORIGIN
            || name == header::TRANSFER_ENCODING
            || name == header::CONNECTION
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
}

/// Split an upstream body into one frame per `\n`-terminated line.
///
/// A trailing unterminated line is emitted at EOF. A read error ends the
/// stream early; the client sees a truncated body.
pub fn event_stream_lines(
    body: BodyStream,
    node_id: String,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    futures::stream::unfold(Some((body, BytesMut::new())), move |state| {
        let node_id = node_id.clone();
        async move {
            let (mut body, mut buf) = state?;
            loop {
                if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line = buf.split_to(pos + 1).freeze();
                    return Some((Ok(line), Some((body, buf))));
                }
                match body.next().await {
                    Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        warn!(node_id = %node_id, error = %e, "event stream read failed");
                        return None;
                    }
                    None if buf.is_empty() => {
                        debug!(node_id = %node_id, "event stream closed by upstream");
                        return None;
                    }
                    None => return Some((Ok(buf.split().freeze()), None)),
                }
            }
        }
    })
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("status", &self.status)
            .field("max_request_size", &self.max_request_size)
            .field("legacy_envelope", &self.legacy_envelope)
            .finish_non_exhaustive()
    }
}
