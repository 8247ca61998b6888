//! Wire types and header names used by the proxy.

use http::HeaderName;
use serde::{Deserialize, Serialize};

/// This node's P2P identity.
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
/// Decoded EdgePath port.
pub const X_FORWARDED_EDGE_PORT: HeaderName = HeaderName::from_static("x-forwarded-edgeport");
/// Decoded EdgePath node ID.
pub const X_FORWARDED_NODE_ID: HeaderName = HeaderName::from_static("x-forwarded-nodeid");
/// Decoded EdgePath interface URL.
pub const X_FORWARDED_INTERFACE: HeaderName = HeaderName::from_static("x-forwarded-interface");

/// Protocol token written into the `Forwarded` header.
pub const FORWARDED_PROTO: &str = "p2phttp";

/// Root status document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub name: String,
    #[serde(rename = "networkID")]
    pub network_id: u64,
    pub version: String,
}
