//! # Transparent Proxy Flows
//!
//! HTTP requests through the full proxy router (CORS, tracing, auth chain,
//! bridge) into a scripted P2P transport.
//!
//! ## Flows
//!
//! 1. Authorized GET/POST → forwarded to `/transparent_forward` with
//!    `X-Forwarded-*` annotations, route registered in the address book
//! 2. Missing or unknown bearer → 401 before any dial
//! 3. Exchange mode → upstream `Authorization` replaced by the agent's token
//! 4. Unresolvable peer → 503, dial failure → 502, other verbs → 501
//! 5. Event streams → each line reaches the client as it is produced

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use axum::body::Body;
    use axum::routing::post;
    use axum::{Json, Router};
    use eo_01_transparent_proxy::{
        AuthAgentClient, ExchangingValidator, ProxyConfig, X_FORWARDED_EDGE_PORT,
        X_FORWARDED_HOST, X_FORWARDED_INTERFACE, X_FORWARDED_NODE_ID,
    };
    use futures::StreamExt;
    use http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use shared_types::{
        AddressBook, AppPeer, Multiaddr, PeerId, TtlAddressBook, PROTO_TAG_EC_APP,
        TRANSPARENT_FORWARD_URL,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    struct ProxyHarness {
        router: Router,
        transport: Arc<ScriptedTransport>,
        book: Arc<TtlAddressBook>,
        peer: PeerId,
    }

    fn harness(app_peer: AppPeer, transport: ScriptedTransport, with_auth: bool) -> ProxyHarness {
        let peer = PeerId::random();
        let transport = Arc::new(transport);
        let book = Arc::new(TtlAddressBook::new());
        let authorizer = with_auth.then(api_key_authorizer);
        let service = proxy_service(
            ProxyConfig::default(),
            directory_with(&peer, app_peer),
            book.clone(),
            transport.clone(),
            authorizer,
        );

        ProxyHarness {
            router: service.router(),
            transport,
            book,
            peer,
        }
    }

    fn request(method: Method, uri: &str, bearer: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "proxy.local:8080");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // =========================================================================
    // FORWARDING
    // =========================================================================

    #[tokio::test]
    async fn test_authorized_post_is_forwarded_with_annotations() {
        let h = harness(AppPeer::direct(PROVIDER_ADDR), ScriptedTransport::echo(), true);

        let response = h
            .router
            .clone()
            .oneshot(request(
                Method::POST,
                &edge_path(&h.peer, 8080, "api/items"),
                Some(API_KEY),
                "payload",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-upstream"], "edge-app");
        assert_ne!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .map(|v| v.as_bytes()),
            Some(&b"https://upstream.example"[..])
        );
        assert_eq!(body_string(response).await, "payload");

        let calls = h.transport.calls();
        assert_eq!(calls.len(), 1);
        let (dialed, forwarded) = &calls[0];
        assert_eq!(*dialed, h.peer);
        assert_eq!(forwarded.protocol, PROTO_TAG_EC_APP);
        assert_eq!(forwarded.path, TRANSPARENT_FORWARD_URL);
        assert_eq!(forwarded.method, Method::POST);
        assert_eq!(forwarded.headers[X_FORWARDED_NODE_ID], h.peer.to_string().as_str());
        assert_eq!(forwarded.headers[X_FORWARDED_EDGE_PORT], "8080");
        assert_eq!(forwarded.headers[X_FORWARDED_INTERFACE], "api/items");
        assert!(forwarded.headers.contains_key(X_FORWARDED_HOST));

        let forwarded_for = forwarded.headers[header::FORWARDED].to_str().unwrap();
        assert!(forwarded_for.contains("proto=p2phttp"));
        assert!(forwarded_for.contains("host=proxy.local:8080"));

        let expected: Multiaddr = PROVIDER_ADDR.parse().unwrap();
        assert_eq!(h.book.addrs(&h.peer), vec![expected]);
    }

    #[tokio::test]
    async fn test_relay_peer_is_dialed_through_circuit() {
        let relay_id = PeerId::random();
        let relay = format!("/ip4/1.2.3.4/tcp/50001/p2p/{}", relay_id);
        let h = harness(AppPeer::via_relay(relay.clone()), ScriptedTransport::echo(), false);

        let response = h
            .router
            .clone()
            .oneshot(request(Method::GET, &edge_path(&h.peer, 80, "health"), None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let circuit: Multiaddr = format!("{}/p2p-circuit", relay).parse().unwrap();
        assert_eq!(h.book.addrs(&h.peer), vec![circuit]);
    }

    #[tokio::test]
    async fn test_root_status_is_served_locally() {
        let h = harness(AppPeer::direct(PROVIDER_ADDR), ScriptedTransport::echo(), false);

        let response = h
            .router
            .clone()
            .oneshot(request(Method::GET, "/", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let status: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(status["name"], "edge-overlay");
        assert_eq!(status["networkID"], 2);
        assert!(status["version"].is_string());
        assert_eq!(h.transport.call_count(), 0);
    }

    // =========================================================================
    // AUTHORIZATION
    // =========================================================================

    #[tokio::test]
    async fn test_missing_or_unknown_bearer_never_dials() {
        let h = harness(AppPeer::direct(PROVIDER_ADDR), ScriptedTransport::echo(), true);
        let uri = edge_path(&h.peer, 8080, "api");

        for bearer in [None, Some("wrong-key")] {
            let response = h
                .router
                .clone()
                .oneshot(request(Method::GET, &uri, bearer, ""))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let malformed = Request::builder()
            .uri(&uri)
            .header(header::AUTHORIZATION, format!("Basic {}", API_KEY))
            .body(Body::empty())
            .unwrap();
        let response = h.router.clone().oneshot(malformed).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        assert_eq!(h.transport.call_count(), 0);
        assert!(h.book.addrs(&h.peer).is_empty());
    }

    async fn spawn_auth_agent(token: &'static str) -> String {
        let app = Router::new().route(
            "/openapi/task/checkApikey",
            post(move |Json(body): Json<serde_json::Value>| async move {
                let accepted = body["apikey"] == API_KEY && body["port"] == "8080";
                Json(serde_json::json!({
                    "_result": 0,
                    "_desc": "",
                    "data": { "apiToken": token, "result": accepted },
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_exchange_mode_replaces_upstream_authorization() {
        let agent = spawn_auth_agent("edge-session-token").await;
        let client = AuthAgentClient::new(agent, Duration::from_secs(5)).unwrap();

        let peer = PeerId::random();
        let transport = Arc::new(ScriptedTransport::echo());
        let service = proxy_service(
            ProxyConfig::default(),
            directory_with(&peer, AppPeer::direct(PROVIDER_ADDR)),
            Arc::new(TtlAddressBook::new()),
            transport.clone(),
            Some(Arc::new(ExchangingValidator::new(Arc::new(client)))),
        );
        let router = service.router();

        let response = router
            .clone()
            .oneshot(request(Method::GET, &edge_path(&peer, 8080, "api"), Some(API_KEY), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let calls = transport.calls();
        assert_eq!(
            calls[0].1.headers[header::AUTHORIZATION],
            "Bearer edge-session-token"
        );

        // The agent rejects keys for other ports.
        let response = router
            .oneshot(request(Method::GET, &edge_path(&peer, 9090, "api"), Some(API_KEY), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(transport.call_count(), 1);
    }

    // =========================================================================
    // FAILURE MAPPING
    // =========================================================================

    #[tokio::test]
    async fn test_peer_without_address_is_unavailable() {
        let h = harness(AppPeer::default(), ScriptedTransport::echo(), false);

        let response = h
            .router
            .clone()
            .oneshot(request(Method::GET, &edge_path(&h.peer, 8080, "api"), None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let unknown = PeerId::random();
        let response = h
            .router
            .clone()
            .oneshot(request(Method::GET, &edge_path(&unknown, 8080, "api"), None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dial_failure_is_bad_gateway() {
        let h = harness(
            AppPeer::direct(PROVIDER_ADDR),
            ScriptedTransport::new(Reply::Unreachable),
            false,
        );

        let response = h
            .router
            .clone()
            .oneshot(request(Method::POST, &edge_path(&h.peer, 8080, "api"), None, "x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(h.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_path_and_unsupported_method() {
        let h = harness(AppPeer::direct(PROVIDER_ADDR), ScriptedTransport::echo(), false);

        let response = h
            .router
            .clone()
            .oneshot(request(Method::GET, "/edge/node/8080", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = h
            .router
            .clone()
            .oneshot(request(Method::PUT, &edge_path(&h.peer, 8080, "api"), None, "x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_preflight_answered_without_auth_or_dial() {
        let h = harness(AppPeer::direct(PROVIDER_ADDR), ScriptedTransport::echo(), true);

        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri(edge_path(&h.peer, 8080, "api"))
            .header(header::ORIGIN, "https://dapp.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
            .body(Body::empty())
            .unwrap();

        let response = h.router.clone().oneshot(preflight).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(h.transport.call_count(), 0);
    }

    // =========================================================================
    // EVENT STREAMS
    // =========================================================================

    /// Read from `stream` until `buffer` holds a full line, then split it off.
    async fn next_line<S>(stream: &mut S, buffer: &mut Vec<u8>) -> String
    where
        S: futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin,
    {
        loop {
            if let Some(end) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=end).collect();
                return String::from_utf8(line).unwrap();
            }
            let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("line not flushed to the client")
                .expect("stream ended early")
                .unwrap();
            buffer.extend_from_slice(&chunk);
        }
    }

    #[tokio::test]
    async fn test_event_stream_lines_arrive_as_produced() {
        let peer = PeerId::random();
        let (transport, feed) = ScriptedTransport::event_stream();
        let mut config = ProxyConfig::default();
        config.host = "127.0.0.1".parse().unwrap();
        config.port = 0;

        let mut service = proxy_service(
            config,
            directory_with(&peer, AppPeer::direct(PROVIDER_ADDR)),
            Arc::new(TtlAddressBook::new()),
            Arc::new(transport),
            None,
        );
        let addr = service.start().await.unwrap();

        let response = reqwest::Client::new()
            .get(format!("http://{}{}", addr, edge_path(&peer, 8080, "events")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();

        // Each line is read back before the next one is produced.
        for i in 0..3 {
            let line = format!("data: event-{}\n", i);
            feed.send(bytes::Bytes::from(line.clone())).await.unwrap();
            assert_eq!(next_line(&mut stream, &mut buffer).await, line);
        }

        // Two lines in one upstream chunk still come through intact.
        feed.send(bytes::Bytes::from_static(b"id: 7\ndata: pair\n"))
            .await
            .unwrap();
        assert_eq!(next_line(&mut stream, &mut buffer).await, "id: 7\n");
        assert_eq!(next_line(&mut stream, &mut buffer).await, "data: pair\n");

        // A trailing partial line is delivered when the upstream ends.
        feed.send(bytes::Bytes::from_static(b"data: tail"))
            .await
            .unwrap();
        drop(feed);
        let mut rest = buffer;
        while let Some(chunk) = stream.next().await {
            rest.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(rest, b"data: tail");

        service.shutdown().await;
    }
}
