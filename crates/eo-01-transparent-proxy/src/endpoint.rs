//! # Edge Endpoint
//!
//! Receiving side of the bridge. Runs on the node that hosts the edge
//! application and serves what the P2P gateway delivers from `/ec-app/1.0`
//! streams.
//!
//! | Path | Behavior |
//! |------|----------|
//! | `/alive` | `{"time": <unix seconds>}` |
//! | `/transparent_forward` | bearer check, then relay to the local app |
//!
//! The addressed [`EdgePath`] comes from the `X-Forwarded-EdgePort`,
//! `X-Forwarded-NodeID` and `X-Forwarded-Interface` headers with the body
//! forwarded as is. Without those headers, or with `legacy_envelope` set,
//! the body is decoded as a [`TransparentForward`] envelope and its payload
//! is forwarded instead.
//!
//! ```text
//! {method} {app_url}:{edge_path.port}/{edge_path.interface_url}
//! ```
//!
//! The application's status and headers come back minus hop-by-hop framing;
//! `text/event-stream` bodies go out one line per frame.

use crate::bridge::{event_stream_lines, is_event_stream};
use crate::domain::{
    ConfigError, EdgePath, EndpointConfig, ProxyError, TransparentForward, X_FORWARDED_EDGE_PORT,
    X_FORWARDED_INTERFACE, X_FORWARDED_NODE_ID,
};
use crate::middleware::{extract_bearer, TracingLayer};
use crate::ports::BearerStore;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderName, Response};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{Json, Router};
use futures::StreamExt;
use shared_types::TRANSPARENT_FORWARD_URL;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Liveness path served next to the forward handler.
pub const ALIVE_URL: &str = "/alive";

const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
];

/// Relays forwarded requests to the local application.
pub struct EdgeEndpoint {
    client: reqwest::Client,
    app_url: String,
    timeout: Duration,
    max_request_size: usize,
    legacy_envelope: bool,
    bearers: Option<Arc<dyn BearerStore>>,
}

impl EdgeEndpoint {
    /// `bearers` validates the inbound bearer; without it any bearer is
    /// accepted, but one must still be present.
    pub fn new(
        config: &EndpointConfig,
        bearers: Option<Arc<dyn BearerStore>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        // Bodies may stream for as long as the app writes; only connect is
        // bounded here.
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(Self {
            client,
            app_url: config.app_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            max_request_size: config.max_request_size,
            legacy_envelope: config.legacy_envelope,
            bearers,
        })
    }

    /// Application URL for `edge_path`.
    pub fn target_url(&self, edge_path: &EdgePath) -> String {
        format!(
            "{}:{}/{}",
            self.app_url,
            edge_path.port,
            edge_path.interface_url.trim_start_matches('/')
        )
    }

    pub async fn handle(&self, request: Request) -> Response<Body> {
        match self.forward(request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    async fn forward(&self, request: Request) -> Result<Response<Body>, ProxyError> {
        self.check_bearer(request.headers())?;

        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, self.max_request_size)
            .await
            .map_err(|e| ProxyError::Body(e.to_string()))?;

        let (edge_path, payload) = match forwarded_edge_path(&parts.headers)? {
            Some(edge_path) if !self.legacy_envelope => (edge_path, body),
            _ => {
                let envelope: TransparentForward = serde_json::from_slice(&body)
                    .map_err(|e| ProxyError::InvalidEnvelope(e.to_string()))?;
                (envelope.edge_path, Bytes::from(envelope.payload))
            }
        };

        let url = self.target_url(&edge_path);
        let mut headers = parts.headers;
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        strip_hop_by_hop(&mut headers);

        debug!(method = %parts.method, url = %url, "forwarding to local app");
        let send = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(payload)
            .send();
        let upstream = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| {
                warn!(url = %url, "local app timed out");
                ProxyError::App(format!("timed out after {:?}", self.timeout))
            })?
            .map_err(|e| {
                warn!(url = %url, error = %e, "local app unreachable");
                ProxyError::App(e.to_string())
            })?;

        let status = upstream.status();
        let mut upstream_headers = upstream.headers().clone();
        strip_hop_by_hop(&mut upstream_headers);
        let streaming = is_event_stream(&upstream_headers);

        let stream = upstream
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)))
            .boxed();
        let mut response = Response::new(if streaming {
            upstream_headers.remove(header::CONTENT_LENGTH);
            Body::from_stream(event_stream_lines(stream, edge_path.node_id))
        } else {
            Body::from_stream(stream)
        });
        *response.status_mut() = status;
        *response.headers_mut() = upstream_headers;

        Ok(response)
    }

    fn check_bearer(&self, headers: &HeaderMap) -> Result<(), ProxyError> {
        let Some(bearer) = extract_bearer(headers) else {
            warn!("forward without bearer");
            return Err(ProxyError::Unauthorized);
        };
        if let Some(store) = &self.bearers {
            if !store.validate_bearer(&bearer) {
                warn!("forward with unknown bearer");
                return Err(ProxyError::Unauthorized);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for EdgeEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeEndpoint")
            .field("app_url", &self.app_url)
            .field("timeout", &self.timeout)
            .field("legacy_envelope", &self.legacy_envelope)
            .finish_non_exhaustive()
    }
}

/// EdgePath carried by the `X-Forwarded-*` headers, `None` when the port
/// header is absent.
fn forwarded_edge_path(headers: &HeaderMap) -> Result<Option<EdgePath>, ProxyError> {
    let Some(port) = headers.get(X_FORWARDED_EDGE_PORT) else {
        return Ok(None);
    };
    let port = port
        .to_str()
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .ok_or(ProxyError::InvalidHeader("X-Forwarded-EdgePort"))?;

    let text = |name: &HeaderName, display: &'static str| -> Result<String, ProxyError> {
        headers
            .get(name)
            .map(|v| v.to_str().map(str::to_string))
            .transpose()
            .map(Option::unwrap_or_default)
            .map_err(|_| ProxyError::InvalidHeader(display))
    };
    let node_id = text(&X_FORWARDED_NODE_ID, "X-Forwarded-NodeID")?;
    let interface_url = text(&X_FORWARDED_INTERFACE, "X-Forwarded-Interface")?;

    Ok(Some(EdgePath::new(node_id, port, interface_url)))
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

/// HTTP server for [`EdgeEndpoint`].
pub struct EdgeEndpointService {
    config: EndpointConfig,
    endpoint: Arc<EdgeEndpoint>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl EdgeEndpointService {
    pub fn new(
        config: EndpointConfig,
        bearers: Option<Arc<dyn BearerStore>>,
    ) -> Result<Self, ConfigError> {
        let endpoint = Arc::new(EdgeEndpoint::new(&config, bearers)?);
        Ok(Self {
            config,
            endpoint,
            shutdown_tx: None,
            server: None,
        })
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(ALIVE_URL, get(alive))
            .route(TRANSPARENT_FORWARD_URL, any(handle_forward))
            .layer(TracingLayer::new())
            .with_state(Arc::clone(&self.endpoint))
    }

    /// Bind the configured address and serve in the background.
    pub async fn start(&mut self) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        let router = self.router();
        self.server = Some(tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;

            if let Err(e) = served {
                error!(error = %e, "edge endpoint server error");
            }
        }));

        info!(addr = %local_addr, app_url = %self.config.app_url, "edge endpoint listening");
        Ok(local_addr)
    }

    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            if let Err(e) = server.await {
                error!(error = %e, "edge endpoint task failed");
            }
            info!("edge endpoint stopped");
        }
    }
}

async fn alive() -> Json<serde_json::Value> {
    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    Json(serde_json::json!({ "time": time }))
}

async fn handle_forward(State(endpoint): State<Arc<EdgeEndpoint>>, request: Request) -> Response<Body> {
    endpoint.handle(request).await
}
