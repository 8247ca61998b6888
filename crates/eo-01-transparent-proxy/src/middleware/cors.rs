//! CORS from the configured origin allow-list.
//!
//! `*` answers every origin with `*`. Otherwise only an exact origin match is
//! echoed back; other origins get no `Access-Control-Allow-Origin` at all.
//! Preflight `OPTIONS` requests are answered here.

use crate::domain::CorsConfig;
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer as TowerCorsLayer};

/// Create CORS layer from proxy config
pub fn create_cors_layer(config: &CorsConfig) -> TowerCorsLayer {
    let mut cors = TowerCorsLayer::new().allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    if config.allowed_origins.iter().any(|o| o == "*") {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    if config.allowed_headers.iter().any(|h| h == "*") {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<HeaderName> = config
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors.max_age(config.max_age)
}
