//! # Node Runtime Library
//!
//! This library exposes the wiring of the edge overlay node for testing.
//! The main entry point is the `main.rs` binary.
//!
//! - `config/` - `NodeConfig` loading (file + `EO_*` overrides) and validation
//! - `logging/` - tracing subscriber setup
//! - `adapters/` - static peer directory and gateway-backed P2P transport
//! - `runtime/` - `NodeRuntime`: builds and runs the proxy and the pool

pub mod adapters;
pub mod config;
pub mod logging;
pub mod runtime;

pub use config::{AuthMode, NodeConfig};
pub use runtime::NodeRuntime;
