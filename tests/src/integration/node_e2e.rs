//! # Node End-to-End
//!
//! A full [`NodeRuntime`](node_runtime::NodeRuntime) listening on a real
//! port, driven with an HTTP client.
//!
//! ```text
//! reqwest ──▶ proxy ──┐
//!                     ├──▶ shared transport ──▶ edge app
//! TelegramPool ───────┘
//! ```

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use axum::extract::Path;
    use axum::http::HeaderMap;
    use axum::routing::any;
    use axum::Router;
    use bytes::Bytes;
    use eo_02_telegram_pool::EdgeResponse;
    use node_runtime::{AuthMode, NodeConfig, NodeRuntime};
    use shared_types::{AddressBook, AppPeer, PeerId, TtlAddressBook, TRANSPARENT_FORWARD_URL};
    use std::sync::Arc;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn node_config(peer: &PeerId) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.proxy.host = "127.0.0.1".parse().unwrap();
        config.proxy.port = 0;
        config.auth.mode = AuthMode::ApiKeys;
        config.auth.api_keys = vec![API_KEY.to_string()];
        config
            .peers
            .insert(peer.to_string(), AppPeer::direct(PROVIDER_ADDR));
        config
    }

    /// A P2P gateway whose every peer echoes the body and reports what the
    /// proxy annotated.
    async fn spawn_gateway() -> String {
        let app = Router::new().route(
            "/p2p/:peer/*path",
            any(
                |Path((peer, path)): Path<(String, String)>, headers: HeaderMap, body: Bytes| async move {
                    let node = headers
                        .get("x-forwarded-nodeid")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    let interface = headers
                        .get("x-forwarded-interface")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    (
                        [("x-seen", format!("{peer}|/{path}|{node}|{interface}"))],
                        body,
                    )
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    // =========================================================================
    // FLOWS
    // =========================================================================

    #[tokio::test]
    async fn test_proxy_and_pool_share_one_transport() {
        let peer = PeerId::random();
        let transport = Arc::new(ScriptedTransport::provider(provider_key()));
        let book = Arc::new(TtlAddressBook::new());

        let mut node =
            NodeRuntime::with_transport(node_config(&peer), book.clone(), transport.clone())
                .unwrap();
        let addr = node.start().await.unwrap();
        let client = reqwest::Client::new();

        // Status is local but still behind the bearer check.
        let status = client.get(format!("http://{}/", addr)).send().await.unwrap();
        assert_eq!(status.status(), reqwest::StatusCode::UNAUTHORIZED);

        let status: serde_json::Value = client
            .get(format!("http://{}/", addr))
            .bearer_auth(API_KEY)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["name"], "edge-overlay");

        // The proxy relays the provider's raw answer.
        let forwarded = client
            .post(format!("http://{}{}", addr, edge_path(&peer, 8080, "api/echo")))
            .bearer_auth(API_KEY)
            .body("ping")
            .send()
            .await
            .unwrap();
        assert_eq!(forwarded.status(), reqwest::StatusCode::OK);
        let raw = forwarded.bytes().await.unwrap();
        assert_eq!(EdgeResponse::from_rlp(&raw).unwrap().resp_string, "echo:ping");

        // The pool dials the same peer through the same transport.
        let mut tele = signed_edge_call(&peer, "/api/echo", "pong");
        assert_eq!(node.pool().add_tele(&mut tele).await.unwrap(), "echo:pong");

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1.path, TRANSPARENT_FORWARD_URL);
        assert_eq!(calls[1].1.path, "/api/echo");
        assert!(calls.iter().all(|(dialed, _)| *dialed == peer));
        assert_eq!(node.address_book().addrs(&peer).len(), 1);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_node_over_gateway_transport() {
        let peer = PeerId::random();
        let mut config = node_config(&peer);
        config.auth.mode = AuthMode::Disabled;
        config.gateway.url = spawn_gateway().await;

        let mut node = NodeRuntime::new(config).unwrap();
        let addr = node.start().await.unwrap();

        let response = reqwest::Client::new()
            .post(format!("http://{}{}", addr, edge_path(&peer, 3000, "v1/items")))
            .body("hello edge")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers()["x-seen"].to_str().unwrap(),
            format!("{}|{}|{}|v1/items", peer, TRANSPARENT_FORWARD_URL, peer)
        );
        assert_eq!(response.text().await.unwrap(), "hello edge");

        // Unknown peers never reach the gateway.
        let unknown = PeerId::random();
        let response = reqwest::Client::new()
            .get(format!("http://{}{}", addr, edge_path(&unknown, 3000, "v1")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_node_config_from_json() {
        let peer = PeerId::random();
        let raw = serde_json::json!({
            "proxy": { "host": "127.0.0.1", "port": 0 },
            "auth": { "mode": "api_keys", "api_keys": [API_KEY] },
            "peers": { peer.to_string(): { "addr": PROVIDER_ADDR } },
        })
        .to_string();

        let config = NodeConfig::from_json(&raw).unwrap();
        assert_eq!(config.auth.mode, AuthMode::ApiKeys);

        let transport = Arc::new(ScriptedTransport::echo());
        let mut node =
            NodeRuntime::with_transport(config, Arc::new(TtlAddressBook::new()), transport.clone())
                .unwrap();
        let addr = node.start().await.unwrap();

        let response = reqwest::Client::new()
            .get(format!("http://{}{}", addr, edge_path(&peer, 8080, "api")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
        assert_eq!(transport.call_count(), 0);

        node.shutdown().await;
    }
}
