//! # Domain Layer - Telegram Pool
//!
//! Pure logic with no I/O:
//!
//! - `entities`: Telegram, EdgeCall, EdgeResponse and their wire formats
//! - `signature`: signing hashes, sender/provider recovery
//! - `gauge`: SlotGauge admission counter
//! - `queue`: per-account nonce queues
//! - `config`: TelepoolConfig
//! - `errors`: TelepoolError

pub mod config;
pub mod entities;
pub mod errors;
pub mod gauge;
pub mod queue;
pub mod signature;

pub use config::*;
pub use entities::*;
pub use errors::*;
pub use gauge::*;
pub use queue::*;
pub use signature::*;
