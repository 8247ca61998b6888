//! Proxy configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default body limit for inbound requests (4 MiB).
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 4 * 1024 * 1024;

/// Transparent proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
    /// Network ID reported by the root status endpoint
    pub network_id: u64,
    /// Chain name reported by the root status endpoint
    pub chain_name: String,
    /// Version reported by the root status endpoint
    pub version: String,
    /// Requests must carry a bearer accepted by the configured authorizer
    pub auth_enabled: bool,
    /// Largest inbound body forwarded upstream
    pub max_request_size: usize,
    /// Wrap forwarded bodies in the `{edge_path, payload}` JSON envelope
    pub legacy_envelope: bool,
    /// CORS configuration
    pub cors: CorsConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
            network_id: 2,
            chain_name: "edge-overlay".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            auth_enabled: false,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            legacy_envelope: false,
            cors: CorsConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_request_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_request_size cannot be 0".into(),
            ));
        }
        if self.cors.allowed_origins.is_empty() {
            return Err(ConfigError::Invalid(
                "cors.allowed_origins cannot be empty".into(),
            ));
        }
        if self.cors.max_age.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "cors.max_age cannot be 0".into(),
            ));
        }
        Ok(())
    }

    /// Get HTTP server bind address
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Receiving side of `/transparent_forward`: where forwarded requests land
/// on the node hosting the edge application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Serve the endpoint at all
    pub enabled: bool,
    /// Bind address the P2P gateway delivers inbound streams to
    pub host: IpAddr,
    /// Port (default: 8090)
    pub port: u16,
    /// Scheme and host of the local application, without port
    pub app_url: String,
    /// Bound on connecting to the application and receiving its response head
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Largest forwarded body accepted
    pub max_request_size: usize,
    /// Always read the `{edge_path, payload}` envelope, even when the
    /// `X-Forwarded-*` headers are present
    pub legacy_envelope: bool,
    /// Accepted bearers. Empty accepts any bearer, but one must be present.
    pub api_keys: Vec<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8090,
            app_url: "http://127.0.0.1".to_string(),
            timeout: Duration::from_secs(30),
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            legacy_envelope: false,
            api_keys: Vec::new(),
        }
    }
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.app_url.starts_with("http://") || self.app_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "endpoint.app_url must be an http(s) URL, got {:?}",
                self.app_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "endpoint.timeout cannot be 0".into(),
            ));
        }
        if self.max_request_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "endpoint.max_request_size cannot be 0".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
    /// Allowed headers ("*" for all)
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            max_age: Duration::from_secs(86400),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
