//! # Node Runtime
//!
//! Wires configuration into running services.
//!
//! ```text
//! NodeConfig
//!   ├─ peers ─────────▶ StaticPeerDirectory ─┐
//!   ├─                  TtlAddressBook ──────┼─▶ TransparentProxyService
//!   ├─ gateway ───────▶ GatewayTransport ────┤
//!   ├─ auth ──────────▶ Authorizer ──────────┘
//!   ├─ telepool ──────▶ TelegramPool (same directory / book / transport)
//!   └─ endpoint ──────▶ EdgeEndpointService (when enabled)
//! ```
//!
//! ## Startup
//!
//! 1. Spawn the pool event loop
//! 2. Bind and serve the edge endpoint, if enabled
//! 3. Bind and serve the proxy
//!
//! Shutdown runs in reverse: the proxy stops accepting, the endpoint stops,
//! then the pool closes.

use crate::adapters::{GatewayTransport, StaticPeerDirectory};
use crate::config::{AuthConfig, AuthMode, NodeConfig};
use anyhow::{Context, Result};
use eo_01_transparent_proxy::{
    ApiKeySet, AuthAgentClient, Authorizer, BearerStore, BooleanValidator, EdgeEndpointService,
    EndpointConfig, ExchangingValidator, ProxyDeps, TransparentProxyService,
};
use eo_02_telegram_pool::{EdgeSigner, TelegramPool};
use shared_types::{P2pTransport, PeerId, TtlAddressBook};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// The running node: proxy plus pool over one set of P2P collaborators.
pub struct NodeRuntime {
    local_peer: PeerId,
    directory: Arc<StaticPeerDirectory>,
    address_book: Arc<TtlAddressBook>,
    proxy: TransparentProxyService,
    endpoint: Option<EdgeEndpointService>,
    endpoint_addr: Option<SocketAddr>,
    pool: Arc<TelegramPool>,
    pool_task: Option<JoinHandle<()>>,
}

impl NodeRuntime {
    /// Build the node with the gateway transport from `config.gateway`.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let address_book = Arc::new(TtlAddressBook::new());
        let transport = Arc::new(
            GatewayTransport::new(
                config.gateway.url.clone(),
                config.gateway.timeout,
                address_book.clone(),
            )
            .context("failed to build gateway transport")?,
        );
        Self::with_transport(config, address_book, transport)
    }

    /// Build the node over an existing transport.
    pub fn with_transport(
        mut config: NodeConfig,
        address_book: Arc<TtlAddressBook>,
        transport: Arc<dyn P2pTransport>,
    ) -> Result<Self> {
        config.sync_auth();
        config.validate().context("invalid node configuration")?;

        let local_peer = match &config.node.peer_id {
            Some(id) => PeerId::from_str(id).with_context(|| format!("invalid peer id {id:?}"))?,
            None => PeerId::random(),
        };

        let directory = Arc::new(StaticPeerDirectory::new(config.peers.clone()));
        let authorizer = build_authorizer(&config.auth)?;

        let proxy = TransparentProxyService::new(
            config.proxy.clone(),
            ProxyDeps {
                directory: directory.clone(),
                address_book: address_book.clone(),
                transport: transport.clone(),
                local_peer,
            },
            authorizer,
        )
        .context("invalid proxy configuration")?;

        let endpoint = if config.endpoint.enabled {
            Some(
                EdgeEndpointService::new(
                    config.endpoint.clone(),
                    endpoint_bearers(&config.endpoint),
                )
                .context("invalid endpoint configuration")?,
            )
        } else {
            None
        };

        let pool = Arc::new(
            TelegramPool::new(
                config.telepool.clone(),
                directory.clone(),
                address_book.clone(),
                transport,
                Arc::new(EdgeSigner::new(config.telepool.chain_id)),
            )
            .context("invalid telepool configuration")?,
        );

        info!(
            peer_id = %local_peer,
            peers = directory.len(),
            auth = ?config.auth.mode,
            endpoint = config.endpoint.enabled,
            "edge overlay node created"
        );

        Ok(Self {
            local_peer,
            directory,
            address_book,
            proxy,
            endpoint,
            endpoint_addr: None,
            pool,
            pool_task: None,
        })
    }

    /// Start the pool loop and the proxy. Returns the proxy's bound address.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        self.pool_task = Some(self.pool.start().context("failed to start telegram pool")?);
        info!("telegram pool started");

        if let Some(endpoint) = self.endpoint.as_mut() {
            let addr = endpoint
                .start()
                .await
                .context("failed to start edge endpoint")?;
            self.endpoint_addr = Some(addr);
        }

        let addr = self
            .proxy
            .start()
            .await
            .context("failed to start transparent proxy")?;
        Ok(addr)
    }

    /// Stop the proxy, then close the pool and wait for its loop.
    pub async fn shutdown(&mut self) {
        info!("initiating shutdown");
        self.proxy.shutdown().await;
        if let Some(endpoint) = self.endpoint.as_mut() {
            endpoint.shutdown().await;
        }

        self.pool.close();
        if let Some(task) = self.pool_task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "telegram pool task failed");
            }
        }
        info!("shutdown complete");
    }

    pub fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    /// Bound address of the edge endpoint once started.
    pub fn endpoint_addr(&self) -> Option<SocketAddr> {
        self.endpoint_addr
    }

    pub fn pool(&self) -> Arc<TelegramPool> {
        Arc::clone(&self.pool)
    }

    pub fn directory(&self) -> Arc<StaticPeerDirectory> {
        Arc::clone(&self.directory)
    }

    pub fn address_book(&self) -> Arc<TtlAddressBook> {
        Arc::clone(&self.address_book)
    }
}

/// Authorizer for the configured mode, `None` when auth is disabled.
pub fn build_authorizer(auth: &AuthConfig) -> Result<Option<Arc<dyn Authorizer>>> {
    let authorizer: Arc<dyn Authorizer> = match auth.mode {
        AuthMode::Disabled => return Ok(None),
        AuthMode::ApiKeys => Arc::new(BooleanValidator::new(Arc::new(ApiKeySet::new(
            auth.api_keys.iter().cloned(),
        )))),
        AuthMode::Exchange => {
            let client = AuthAgentClient::new(auth.app_path.clone(), auth.timeout)
                .context("failed to build auth agent client")?;
            Arc::new(ExchangingValidator::new(Arc::new(client)))
        }
    };
    Ok(Some(authorizer))
}

/// Bearer store for the edge endpoint; `None` accepts any bearer.
fn endpoint_bearers(endpoint: &EndpointConfig) -> Option<Arc<dyn BearerStore>> {
    let keys = ApiKeySet::new(endpoint.api_keys.iter().cloned());
    if keys.is_empty() {
        None
    } else {
        Some(Arc::new(keys))
    }
}
