//! Transparent proxy HTTP service.

use crate::bridge::Bridge;
use crate::domain::{ConfigError, ProxyConfig, StatusResponse};
use crate::middleware::{create_cors_layer, EdgeAuthChain, TracingLayer};
use crate::ports::Authorizer;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use shared_types::{AddressBook, P2pTransport, PeerDirectory, PeerId};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tracing::{error, info};

/// P2P collaborators the proxy is built on.
#[derive(Clone)]
pub struct ProxyDeps {
    pub directory: Arc<dyn PeerDirectory>,
    pub address_book: Arc<dyn AddressBook>,
    pub transport: Arc<dyn P2pTransport>,
    /// This node's own P2P identity, sent as `X-Forwarded-Host`.
    pub local_peer: PeerId,
}

/// Transparent proxy service state
pub struct TransparentProxyService {
    config: ProxyConfig,
    chain: Arc<EdgeAuthChain>,
    bridge: Arc<Bridge>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl TransparentProxyService {
    /// Create a new proxy.
    ///
    /// `authorizer` is required when `config.auth_enabled` is set and ignored
    /// otherwise.
    pub fn new(
        config: ProxyConfig,
        deps: ProxyDeps,
        authorizer: Option<Arc<dyn Authorizer>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let authorizer = if config.auth_enabled {
            Some(authorizer.ok_or_else(|| {
                ConfigError::Invalid("auth_enabled requires an authorizer".into())
            })?)
        } else {
            None
        };

        let chain = Arc::new(EdgeAuthChain::new(authorizer, deps.local_peer));
        let status = StatusResponse {
            name: config.chain_name.clone(),
            network_id: config.network_id,
            version: config.version.clone(),
        };
        let bridge = Arc::new(
            Bridge::new(
                deps.directory,
                deps.address_book,
                deps.transport,
                status,
                config.max_request_size,
            )
            .with_legacy_envelope(config.legacy_envelope),
        );

        Ok(Self {
            config,
            chain,
            bridge,
            shutdown_tx: None,
            server: None,
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Build the HTTP router.
    ///
    /// Every path is handled by the edge fallback; CORS and tracing wrap it.
    pub fn router(&self) -> Router {
        let state = ProxyState {
            chain: Arc::clone(&self.chain),
            bridge: Arc::clone(&self.bridge),
        };

        let middleware = ServiceBuilder::new()
            .layer(create_cors_layer(&self.config.cors))
            .layer(TracingLayer::new());

        Router::new()
            .fallback(handle_edge_request)
            .layer(middleware)
            .with_state(state)
    }

    /// Bind the configured address and serve in the background.
    ///
    /// Returns the bound address (useful with port 0).
    pub async fn start(&mut self) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        let router = self.router();
        self.server = Some(tokio::spawn(async move {
            let served = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;

            if let Err(e) = served {
                error!(error = %e, "transparent proxy server error");
            }
        }));

        info!(addr = %local_addr, auth = self.chain.requires_auth(), "transparent proxy listening");
        Ok(local_addr)
    }

    /// Trigger graceful shutdown and wait for the server task to finish.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            if let Err(e) = server.await {
                error!(error = %e, "transparent proxy task failed");
            }
            info!("transparent proxy stopped");
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct ProxyState {
    chain: Arc<EdgeAuthChain>,
    bridge: Arc<Bridge>,
}

async fn handle_edge_request(State(state): State<ProxyState>, request: Request) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    match state.chain.admit(request).await {
        Ok(admitted) => state.bridge.handle(admitted).await,
        Err(e) => e.into_response(),
    }
}
