//! Shared collaborators for the integration flows.
//!
//! [`ScriptedTransport`] stands in for the libp2p host: it records every
//! round trip and answers from a fixed [`Reply`] script.
//! [`LoopbackTransport`] instead hands each round trip to an in-process
//! router, usually the remote node's edge endpoint.

use async_trait::async_trait;
use bytes::Bytes;
use eo_01_transparent_proxy::{
    ApiKeySet, Authorizer, BooleanValidator, ProxyConfig, ProxyDeps, TransparentProxyService,
};
use eo_02_telegram_pool::{sign_edge_response, sign_telegram, Telegram, EDGE_CALL_PRECOMPILE};
use futures::StreamExt;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use k256::ecdsa::SigningKey;
use node_runtime::adapters::StaticPeerDirectory;
use parking_lot::Mutex;
use shared_types::{
    AppPeer, P2pRequest, P2pResponse, P2pTransport, PeerId, TransportError, TtlAddressBook,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tower::ServiceExt;

// =============================================================================
// KEYS AND TELEGRAMS
// =============================================================================

pub const CHAIN_ID: u64 = 2;
pub const PROVIDER_ADDR: &str = "/ip4/10.0.0.7/tcp/50001";
pub const API_KEY: &str = "integration-key";

pub fn sender_key() -> SigningKey {
    SigningKey::from_slice(&[0x11; 32]).unwrap()
}

pub fn provider_key() -> SigningKey {
    SigningKey::from_slice(&[0x22; 32]).unwrap()
}

pub fn intruder_key() -> SigningKey {
    SigningKey::from_slice(&[0x33; 32]).unwrap()
}

/// A plain telegram from [`sender_key`].
pub fn signed_plain(nonce: u64) -> Telegram {
    let mut tele = Telegram::new(nonce, Some([0x42; 20]), b"note".to_vec());
    sign_telegram(&mut tele, &sender_key(), CHAIN_ID).unwrap();
    tele
}

/// An edge call to `peer` from [`sender_key`].
pub fn signed_edge_call(peer: &PeerId, endpoint: &str, input: &str) -> Telegram {
    let call = serde_json::json!({
        "peerId": peer.to_string(),
        "endpoint": endpoint,
        "input": input,
    });
    let mut tele = Telegram::new(0, Some(EDGE_CALL_PRECOMPILE), call.to_string().into_bytes());
    sign_telegram(&mut tele, &sender_key(), CHAIN_ID).unwrap();
    tele
}

// =============================================================================
// DIRECTORY AND PROXY
// =============================================================================

pub fn directory_with(peer: &PeerId, app_peer: AppPeer) -> Arc<StaticPeerDirectory> {
    Arc::new(StaticPeerDirectory::new(HashMap::from([(
        peer.to_string(),
        app_peer,
    )])))
}

pub fn api_key_authorizer() -> Arc<dyn Authorizer> {
    Arc::new(BooleanValidator::new(Arc::new(ApiKeySet::new([API_KEY]))))
}

/// A proxy over the given collaborators, not yet listening.
pub fn proxy_service(
    config: ProxyConfig,
    directory: Arc<StaticPeerDirectory>,
    address_book: Arc<TtlAddressBook>,
    transport: Arc<ScriptedTransport>,
    authorizer: Option<Arc<dyn Authorizer>>,
) -> TransparentProxyService {
    let config = ProxyConfig {
        auth_enabled: authorizer.is_some(),
        ..config
    };
    TransparentProxyService::new(
        config,
        ProxyDeps {
            directory,
            address_book,
            transport,
            local_peer: PeerId::random(),
        },
        authorizer,
    )
    .unwrap()
}

pub fn edge_path(peer: &PeerId, port: u16, interface: &str) -> String {
    format!("/edge/{}/{}/{}", peer, port, interface)
}

// =============================================================================
// SCRIPTED TRANSPORT
// =============================================================================

/// How [`ScriptedTransport`] answers.
pub enum Reply {
    /// 200 echoing the request body, with an upstream CORS header.
    Echo,
    /// An empty response with this status.
    Status(StatusCode),
    /// 200 with an RLP edge response over `echo:{body}`, signed by the key.
    Provider(SigningKey),
    /// 200 `text/event-stream` whose body is fed by the paired sender.
    EventStream(Mutex<Option<mpsc::Receiver<Bytes>>>),
    /// The dial fails.
    Unreachable,
}

pub struct ScriptedTransport {
    reply: Reply,
    gate: Option<Semaphore>,
    calls: Mutex<Vec<(PeerId, P2pRequest)>>,
    entered: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            gate: None,
            calls: Mutex::new(Vec::new()),
            entered: AtomicUsize::new(0),
        }
    }

    pub fn echo() -> Self {
        Self::new(Reply::Echo)
    }

    pub fn provider(key: SigningKey) -> Self {
        Self::new(Reply::Provider(key))
    }

    /// A streaming transport and the sender that feeds its one body.
    pub fn event_stream() -> (Self, mpsc::Sender<Bytes>) {
        let (tx, rx) = mpsc::channel(16);
        (Self::new(Reply::EventStream(Mutex::new(Some(rx)))), tx)
    }

    /// Hold every round trip until [`ScriptedTransport::release`].
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    /// Round trips that have started, including ones still held at the gate.
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<(PeerId, P2pRequest)> {
        self.calls.lock().clone()
    }

    fn respond(&self, request: &P2pRequest) -> Result<P2pResponse, TransportError> {
        let mut headers = HeaderMap::new();
        let (status, body) = match &self.reply {
            Reply::Echo => {
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("https://upstream.example"),
                );
                headers.insert("x-upstream", HeaderValue::from_static("edge-app"));
                (StatusCode::OK, request.body.clone())
            }
            Reply::Status(status) => (*status, Bytes::new()),
            Reply::Provider(key) => {
                let input = String::from_utf8_lossy(&request.body);
                let response = sign_edge_response(format!("echo:{}", input), key)
                    .map_err(|e| TransportError::Request(e.to_string()))?;
                (StatusCode::OK, Bytes::from(response.to_rlp()))
            }
            Reply::EventStream(receiver) => {
                let rx = receiver
                    .lock()
                    .take()
                    .ok_or_else(|| TransportError::Request("stream already consumed".into()))?;
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/event-stream; charset=utf-8"),
                );
                let body = futures::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|chunk| (Ok(chunk), rx))
                })
                .boxed();
                return Ok(P2pResponse {
                    status: StatusCode::OK,
                    headers,
                    body,
                });
            }
            Reply::Unreachable => {
                return Err(TransportError::Dial {
                    peer: "scripted".into(),
                    reason: "connection refused".into(),
                })
            }
        };

        Ok(P2pResponse {
            status,
            headers,
            body: futures::stream::once(async move { Ok(body) }).boxed(),
        })
    }
}

#[async_trait]
impl P2pTransport for ScriptedTransport {
    async fn round_trip(
        &self,
        peer: PeerId,
        request: P2pRequest,
    ) -> Result<P2pResponse, TransportError> {
        self.calls.lock().push((peer, request.clone()));
        self.entered.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;
        }
        self.respond(&request)
    }
}

// =============================================================================
// LOOPBACK TRANSPORT
// =============================================================================

/// Delivers every round trip to `router` as if the peer's gateway had
/// opened the stream locally. Streamed response bodies stay streamed.
pub struct LoopbackTransport {
    router: axum::Router,
    calls: Mutex<Vec<(PeerId, P2pRequest)>>,
}

impl LoopbackTransport {
    pub fn new(router: axum::Router) -> Self {
        Self {
            router,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(PeerId, P2pRequest)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl P2pTransport for LoopbackTransport {
    async fn round_trip(
        &self,
        peer: PeerId,
        request: P2pRequest,
    ) -> Result<P2pResponse, TransportError> {
        self.calls.lock().push((peer, request.clone()));

        let mut inbound = http::Request::builder()
            .method(request.method)
            .uri(request.path.as_str())
            .body(axum::body::Body::from(request.body))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        *inbound.headers_mut() = request.headers;

        let response = self
            .router
            .clone()
            .oneshot(inbound)
            .await
            .map_err(|e| -> TransportError { match e {} })?;

        let (parts, body) = response.into_parts();
        let body = body
            .into_data_stream()
            .map(|chunk| chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)))
            .boxed();
        Ok(P2pResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}
