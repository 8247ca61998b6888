//! # Node Configuration
//!
//! Unified configuration for the proxy, the pool and the runtime around them.
//!
//! ## Sources
//!
//! 1. Defaults
//! 2. JSON file named by `EO_CONFIG` (optional)
//! 3. `EO_*` environment overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `EO_PEER_ID` | `node.peer_id` |
//! | `EO_PROXY_HOST` / `EO_PROXY_PORT` | `proxy.host` / `proxy.port` |
//! | `EO_NETWORK_ID` | `proxy.network_id` |
//! | `EO_CHAIN_ID` | `telepool.chain_id` |
//! | `EO_AUTH_MODE` | `auth.mode` (`disabled`, `api_keys`, `exchange`) |
//! | `EO_API_KEYS` | `auth.api_keys` (comma separated) |
//! | `EO_APP_PATH` | `auth.app_path` |
//! | `EO_GATEWAY_URL` | `gateway.url` |
//! | `EO_ENDPOINT_PORT` | `endpoint.port` (also sets `endpoint.enabled`) |
//! | `EO_APP_URL` | `endpoint.app_url` |
//! | `EO_LOG` / `EO_LOG_JSON` | `logging.filter` / `logging.json` |

use eo_01_transparent_proxy::{EndpointConfig, ProxyConfig};
use eo_02_telegram_pool::TelepoolConfig;
use serde::{Deserialize, Serialize};
use shared_types::AppPeer;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the JSON config file.
pub const CONFIG_PATH_ENV: &str = "EO_CONFIG";

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: IdentityConfig,
    pub proxy: ProxyConfig,
    pub telepool: TelepoolConfig,
    pub auth: AuthConfig,
    /// Static peer directory: node ID → direct address and/or relay.
    pub peers: HashMap<String, AppPeer>,
    pub gateway: GatewayConfig,
    /// Receiving side for requests forwarded to this node's application.
    pub endpoint: EndpointConfig,
    pub logging: LoggingConfig,
}

/// This node's P2P identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base58 peer ID. A random identity is generated when unset.
    pub peer_id: Option<String>,
}

/// How proxy requests are authorized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    Disabled,
    /// Bearer must be one of `api_keys`.
    ApiKeys,
    /// Bearer is exchanged with the application at `app_path`.
    Exchange,
}

impl std::str::FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" | "none" => Ok(Self::Disabled),
            "api_keys" => Ok(Self::ApiKeys),
            "exchange" => Ok(Self::Exchange),
            other => Err(ConfigError::Invalid(format!("unknown auth mode {other:?}"))),
        }
    }
}

/// Authorization settings. The mode decides `proxy.auth_enabled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub api_keys: Vec<String>,
    /// Application root for the key-check endpoint.
    pub app_path: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Disabled,
            api_keys: Vec::new(),
            app_path: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Local P2P HTTP gateway the transport talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub url: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:4100".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Logging settings. `RUST_LOG` takes precedence over `filter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("invalid environment override {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("proxy: {0}")]
    Proxy(#[from] eo_01_transparent_proxy::ConfigError),

    #[error("telepool: {0}")]
    Telepool(#[from] eo_02_telegram_pool::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl NodeConfig {
    /// Defaults, then the `EO_CONFIG` file, then `EO_*` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.sync_auth();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `EO_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(var: &'static str, raw: String) -> Result<T, ConfigError>
        where
            T::Err: std::fmt::Display,
        {
            raw.parse().map_err(|e: T::Err| ConfigError::Env {
                var,
                reason: e.to_string(),
            })
        }

        if let Some(v) = lookup("EO_PEER_ID") {
            self.node.peer_id = Some(v);
        }
        if let Some(v) = lookup("EO_PROXY_HOST") {
            self.proxy.host = parsed("EO_PROXY_HOST", v)?;
        }
        if let Some(v) = lookup("EO_PROXY_PORT") {
            self.proxy.port = parsed("EO_PROXY_PORT", v)?;
        }
        if let Some(v) = lookup("EO_NETWORK_ID") {
            self.proxy.network_id = parsed("EO_NETWORK_ID", v)?;
        }
        if let Some(v) = lookup("EO_CHAIN_ID") {
            self.telepool.chain_id = parsed("EO_CHAIN_ID", v)?;
        }
        if let Some(v) = lookup("EO_AUTH_MODE") {
            self.auth.mode = parsed("EO_AUTH_MODE", v)?;
        }
        if let Some(v) = lookup("EO_API_KEYS") {
            self.auth.api_keys = v
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("EO_APP_PATH") {
            self.auth.app_path = v;
        }
        if let Some(v) = lookup("EO_GATEWAY_URL") {
            self.gateway.url = v;
        }
        if let Some(v) = lookup("EO_ENDPOINT_PORT") {
            self.endpoint.port = parsed("EO_ENDPOINT_PORT", v)?;
            self.endpoint.enabled = true;
        }
        if let Some(v) = lookup("EO_APP_URL") {
            self.endpoint.app_url = v;
        }
        if let Some(v) = lookup("EO_LOG") {
            self.logging.filter = v;
        }
        if let Some(v) = lookup("EO_LOG_JSON") {
            self.logging.json = parsed("EO_LOG_JSON", v)?;
        }
        Ok(())
    }

    /// Derive `proxy.auth_enabled` from the auth mode.
    pub fn sync_auth(&mut self) {
        self.proxy.auth_enabled = self.auth.mode != AuthMode::Disabled;
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.proxy.validate()?;
        self.telepool.validate()?;
        if self.endpoint.enabled {
            self.endpoint.validate()?;
        }

        match self.auth.mode {
            AuthMode::ApiKeys if self.auth.api_keys.iter().all(|k| k.is_empty()) => {
                return Err(ConfigError::Invalid(
                    "auth mode api_keys needs at least one key".into(),
                ));
            }
            AuthMode::Exchange if self.auth.app_path.is_empty() => {
                return Err(ConfigError::Invalid(
                    "auth mode exchange needs auth.app_path".into(),
                ));
            }
            _ => {}
        }

        if self.gateway.url.is_empty() {
            return Err(ConfigError::Invalid("gateway.url cannot be empty".into()));
        }
        Ok(())
    }
}
