//! Ports layer for the telegram pool.
//!
//! - Inbound (Driving) ports: API exposed to RPC front-ends
//! - Outbound (Driven) ports: signature recovery

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
