//! # Telegram Pool
//!
//! Admission-controlled intake for signed telegrams.
//!
//! ## Lifecycle
//!
//! ```text
//! Received ──▶ Validated ──┬──▶ Dispatched (edge call) ──▶ Completed
//!                          ├──▶ Enqueued ──▶ Promoted / Pruned
//!                          └──▶ Rejected
//! ```
//!
//! ## Admission Order
//!
//! | Step | Check | Error |
//! |------|-------|-------|
//! | 1 | RLP size `<= max_telegram_size` | `OversizedData` |
//! | 2 | free slot in the gauge | `TxPoolOverflow` |
//! | 3 | sender recoverable | `ExtractSignature` |
//! | 4 | pre-set `from` matches sender | `InvalidSender` |
//! | 5 | provider matches `resp_from` (if set) | `InvalidProvider` |
//!
//! Steps 1 and 2 do no signature work.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service.rs  - TelegramPool: admission, dispatch, event loop    │
//! │  adapters/   - EdgeSigner (k256)                                │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/inbound.rs  - TelegramPoolApi                            │
//! │  ports/outbound.rs - TelegramSigner                             │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/ - Telegram, SlotGauge, AccountQueues, signatures       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Peer resolution and the P2P transport come from `shared-types`.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::EdgeSigner;
pub use domain::*;
pub use ports::*;
pub use service::TelegramPool;
