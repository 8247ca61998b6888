//! Request pipeline stages in front of the bridge.
//!
//! ```text
//! CORS ─▶ TracingLayer ─▶ EdgeAuthChain::admit ─▶ Bridge::handle
//! ```

pub mod auth;
pub mod cors;
pub mod tracing;

pub use self::tracing::TracingLayer;
pub use auth::{extract_bearer, AdmittedRequest, EdgeAuthChain};
pub use cors::create_cors_layer;
