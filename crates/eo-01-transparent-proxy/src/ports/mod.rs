//! Ports for the transparent proxy.

pub mod outbound;

pub use outbound::*;
