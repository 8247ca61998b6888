//! # Inbound Port - TelegramPoolApi
//!
//! Primary driving port used by RPC front-ends to submit telegrams.

use crate::domain::{Telegram, TelepoolError};
use async_trait::async_trait;
use shared_types::Address;

/// Primary API for the telegram pool.
#[async_trait]
pub trait TelegramPoolApi: Send + Sync {
    /// Admit, validate and handle a telegram.
    ///
    /// Edge calls are dispatched and their provider signature is written
    /// back onto `telegram`; the provider's response string is returned.
    /// Other telegrams are enqueued under their sender and an empty string is
    /// returned.
    ///
    /// # Errors
    /// - `OversizedData`: encoding exceeds `max_telegram_size`
    /// - `TxPoolOverflow`: no free slot
    /// - `ExtractSignature`, `InvalidSender`, `InvalidProvider`: validation
    /// - `Resolve`, `Transport`, `EdgeCallFailed`, `InvalidResponse`: dispatch
    /// - `NonceTooLow`, `NonceTooHigh`, `AlreadyKnown`, `MaxEnqueuedLimitReached`: enqueue
    async fn add_tele(&self, telegram: &mut Telegram) -> Result<String, TelepoolError>;

    /// Set the account's next expected nonce and promote what became ready.
    async fn promote(&self, account: Address, next_nonce: u64) -> Result<(), TelepoolError>;

    /// Slots currently held.
    fn slots_in_use(&self) -> u64;
}
