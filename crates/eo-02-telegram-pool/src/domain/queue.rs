//! # Account Queues
//!
//! Per-account, nonce-ordered queues for telegrams that are not edge calls.
//!
//! Each account tracks the next nonce it expects. A telegram is rejected if
//! its nonce is below that (`NonceTooLow`), already queued (`AlreadyKnown`),
//! or if the account already holds `max_account_enqueued` telegrams.
//! Promotion releases the contiguous run starting at the next nonce.
//!
//! Every entry owns the [`SlotGuard`] it was admitted with, so removing an
//! entry (promotion, pruning, nonce reset) frees its slot.
//!
//! A newly seen account starts expecting the nonce of its first telegram.
//! An account is forgotten once a pruning pass finds its queue empty.
//!
//! All methods take `now` explicitly so the queues stay clock-free.

use super::entities::Telegram;
use super::errors::TelepoolError;
use super::gauge::SlotGuard;
use shared_types::Address;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Enqueued {
    telegram: Telegram,
    enqueued_at: Instant,
    _slot: SlotGuard,
}

#[derive(Debug)]
struct AccountQueue {
    next_nonce: u64,
    entries: BTreeMap<u64, Enqueued>,
}

impl AccountQueue {
    /// True if the head of the queue can be promoted.
    fn promotable(&self) -> bool {
        self.entries.contains_key(&self.next_nonce)
    }
}

/// All account queues owned by the pool's event loop.
#[derive(Debug)]
pub struct AccountQueues {
    max_account_enqueued: u64,
    accounts: HashMap<Address, AccountQueue>,
}

impl AccountQueues {
    pub fn new(max_account_enqueued: u64) -> Self {
        Self {
            max_account_enqueued,
            accounts: HashMap::new(),
        }
    }

    /// Total enqueued telegrams across accounts.
    pub fn len(&self) -> usize {
        self.accounts.values().map(|q| q.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Next nonce expected from `account`, if the account is known.
    pub fn next_nonce(&self, account: &Address) -> Option<u64> {
        self.accounts.get(account).map(|q| q.next_nonce)
    }

    /// Enqueue a validated telegram under its `from` account.
    ///
    /// Returns `true` when the account now has a promotable head. On error
    /// the slot is released.
    pub fn enqueue(
        &mut self,
        telegram: Telegram,
        slot: SlotGuard,
        now: Instant,
    ) -> Result<bool, TelepoolError> {
        if telegram.nonce == u64::MAX {
            return Err(TelepoolError::NonceTooHigh);
        }
        let queue = self
            .accounts
            .entry(telegram.from)
            .or_insert_with(|| AccountQueue {
                next_nonce: telegram.nonce,
                entries: BTreeMap::new(),
            });

        if telegram.nonce < queue.next_nonce {
            return Err(TelepoolError::NonceTooLow);
        }
        if queue.entries.contains_key(&telegram.nonce) {
            return Err(TelepoolError::AlreadyKnown);
        }
        if queue.entries.len() as u64 >= self.max_account_enqueued {
            return Err(TelepoolError::MaxEnqueuedLimitReached);
        }

        queue.entries.insert(
            telegram.nonce,
            Enqueued {
                telegram,
                enqueued_at: now,
                _slot: slot,
            },
        );
        Ok(queue.promotable())
    }

    /// Release the contiguous run of telegrams starting at the account's
    /// next nonce and advance the nonce past it.
    pub fn promote(&mut self, account: &Address) -> Vec<Telegram> {
        let Some(queue) = self.accounts.get_mut(account) else {
            return Vec::new();
        };

        let mut promoted = Vec::new();
        while let Some(entry) = queue.entries.remove(&queue.next_nonce) {
            promoted.push(entry.telegram);
            match queue.next_nonce.checked_add(1) {
                Some(next) => queue.next_nonce = next,
                None => break,
            }
        }
        promoted
    }

    /// Move the account's expected nonce, dropping entries below it, then
    /// promote. Returns the promoted telegrams and the number dropped.
    pub fn reset_nonce(&mut self, account: &Address, next_nonce: u64) -> (Vec<Telegram>, usize) {
        let Some(queue) = self.accounts.get_mut(account) else {
            return (Vec::new(), 0);
        };

        let keep = queue.entries.split_off(&next_nonce);
        let dropped = std::mem::replace(&mut queue.entries, keep).len();
        queue.next_nonce = next_nonce;

        (self.promote(account), dropped)
    }

    /// Drop entries enqueued for longer than `ttl`. Returns the number dropped.
    ///
    /// Accounts left with no entries are forgotten, including their next nonce.
    pub fn prune(&mut self, now: Instant, ttl: Duration) -> usize {
        let mut pruned = 0;
        self.accounts.retain(|_, queue| {
            let before = queue.entries.len();
            queue
                .entries
                .retain(|_, entry| now.saturating_duration_since(entry.enqueued_at) < ttl);
            pruned += before - queue.entries.len();
            !queue.entries.is_empty()
        });
        pruned
    }
}
