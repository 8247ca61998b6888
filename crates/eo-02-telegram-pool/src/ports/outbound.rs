//! Outbound (Driven) ports for the telegram pool.

use crate::domain::{SignerError, Telegram};
use shared_types::Address;

/// Recovers the parties that signed a telegram.
///
/// Swappable at runtime through `TelegramPool::set_signer`.
pub trait TelegramSigner: Send + Sync {
    /// The account that signed the telegram itself.
    fn sender(&self, telegram: &Telegram) -> Result<Address, SignerError>;

    /// The provider that signed `resp_hash`.
    fn provider(&self, telegram: &Telegram) -> Result<Address, SignerError>;
}
