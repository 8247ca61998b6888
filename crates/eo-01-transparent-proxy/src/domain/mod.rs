//! Domain layer for the transparent proxy.

pub mod config;
pub mod edge_path;
pub mod error;
pub mod types;

pub use config::*;
pub use edge_path::*;
pub use error::*;
pub use types::*;
