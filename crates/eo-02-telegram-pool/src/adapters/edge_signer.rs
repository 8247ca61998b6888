//! k256-backed [`TelegramSigner`].

use crate::domain::{recover_provider, recover_sender, SignerError, Telegram};
use crate::ports::TelegramSigner;
use shared_types::Address;

/// Recovers senders with EIP-155 signatures bound to one chain ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeSigner {
    chain_id: u64,
}

impl EdgeSigner {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

impl TelegramSigner for EdgeSigner {
    fn sender(&self, telegram: &Telegram) -> Result<Address, SignerError> {
        recover_sender(telegram, self.chain_id)
    }

    fn provider(&self, telegram: &Telegram) -> Result<Address, SignerError> {
        recover_provider(telegram)
    }
}
