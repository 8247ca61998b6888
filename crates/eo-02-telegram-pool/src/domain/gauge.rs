//! Slot gauge: the pool's admission counter.
//!
//! Invariant: `height <= max` at all times. A slot is taken with a
//! compare-and-swap so concurrent admissions can never overshoot, and it is
//! returned when the [`SlotGuard`] is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Atomic `{height, max}` counter.
#[derive(Debug)]
pub struct SlotGauge {
    height: AtomicU64,
    max: u64,
}

impl SlotGauge {
    pub fn new(max: u64) -> Self {
        Self {
            height: AtomicU64::new(0),
            max,
        }
    }

    /// Slots currently held.
    pub fn height(&self) -> u64 {
        self.height.load(Ordering::Acquire)
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    /// Take one slot, or `None` when the gauge is full.
    pub fn try_acquire(self: &Arc<Self>) -> Option<SlotGuard> {
        let mut current = self.height.load(Ordering::Acquire);
        loop {
            if current >= self.max {
                return None;
            }
            match self.height.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(SlotGuard {
                        gauge: Arc::clone(self),
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self) {
        self.height.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One held slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct SlotGuard {
    gauge: Arc<SlotGauge>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.gauge.release();
    }
}
