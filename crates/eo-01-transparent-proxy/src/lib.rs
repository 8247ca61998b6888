//! # Transparent Proxy
//!
//! Bridges HTTP clients to edge applications that are reachable only by
//! their P2P node ID, possibly behind a relay circuit.
//!
//! ## Request Path
//!
//! ```text
//! /<ignored>/<escaped nodeID>/<port>/<escaped interfaceURL...>
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌───────────────┐   ┌─────────────┐
//! │   CORS   │──▶│   Tracing   │──▶│ EdgeAuthChain │──▶│   Bridge    │──▶ P2P
//! │ (tower)  │   │ edge_request│   │ 400 / 401     │   │ 501/502/503 │
//! └──────────┘   └─────────────┘   └───────────────┘   └─────────────┘
//! ```
//!
//! `OPTIONS` stops after CORS. The decoded [`EdgePath`] travels from the
//! chain to the bridge inside [`AdmittedRequest`].
//!
//! ## Authorization Modes
//!
//! | Mode | Authorizer | Upstream `Authorization` |
//! |------|------------|--------------------------|
//! | disabled | none | passed through |
//! | boolean | [`BooleanValidator`] over a [`BearerStore`] | passed through |
//! | exchange | [`ExchangingValidator`] over a [`TokenExchange`] | replaced |
//!
//! ## Receiving Side
//!
//! [`EdgeEndpointService`] runs on the node hosting the edge application and
//! relays each `/transparent_forward` request to that application.

pub mod adapters;
pub mod bridge;
pub mod domain;
pub mod endpoint;
pub mod middleware;
pub mod ports;
pub mod service;

pub use adapters::{ApiKeySet, AuthAgentClient, BooleanValidator, ExchangingValidator};
pub use bridge::Bridge;
pub use domain::*;
pub use endpoint::{EdgeEndpoint, EdgeEndpointService, ALIVE_URL};
pub use middleware::{AdmittedRequest, EdgeAuthChain};
pub use ports::*;
pub use service::{ProxyDeps, TransparentProxyService};
