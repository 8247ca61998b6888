//! Telegram pool error types.

use shared_types::{ResolveError, TransportError};
use thiserror::Error;

/// Errors returned by the telegram pool.
///
/// None of these are retried by the pool.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TelepoolError {
    /// Encoded telegram exceeds `max_telegram_size`.
    #[error("oversized data")]
    OversizedData,

    /// The sender or provider could not be recovered from a signature.
    #[error("cannot extract signature")]
    ExtractSignature,

    /// A pre-set `from` does not match the recovered sender.
    #[error("invalid sender")]
    InvalidSender,

    /// The recovered provider does not match `resp_from`.
    #[error("invalid provider")]
    InvalidProvider,

    /// The slot gauge is at capacity.
    #[error("txpool is full")]
    TxPoolOverflow,

    /// Nonce below the account's next expected nonce.
    #[error("nonce too low")]
    NonceTooLow,

    /// Nonce at `u64::MAX`; nothing could ever follow it.
    #[error("nonce too high")]
    NonceTooHigh,

    /// A telegram with this nonce is already enqueued for the account.
    #[error("already known")]
    AlreadyKnown,

    /// The account queue is at `max_account_enqueued`.
    #[error("maximum number of enqueued transactions reached")]
    MaxEnqueuedLimitReached,

    /// Edge-call input is not a valid `{peerId, endpoint}` document.
    #[error("invalid edge call: {0}")]
    InvalidEdgeCall(String),

    /// The provider node could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The P2P call to the provider failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The provider answered with a non-success status.
    #[error("edge call failed with status {0}")]
    EdgeCallFailed(u16),

    /// The provider's response envelope could not be decoded.
    #[error("invalid edge response: {0}")]
    InvalidResponse(String),

    /// The pool event loop has not been started.
    #[error("telegram pool is not running")]
    NotRunning,

    /// `start` was called on a pool whose event loop already ran.
    #[error("telegram pool already started")]
    AlreadyStarted,

    /// The pool is shutting down.
    #[error("telegram pool is shutting down")]
    ShuttingDown,
}

impl TelepoolError {
    /// True for errors raised by admission and signature validation.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::OversizedData
                | Self::ExtractSignature
                | Self::InvalidSender
                | Self::InvalidProvider
                | Self::TxPoolOverflow
        )
    }
}
