//! Bounded queue of out-of-band parameter changes.
//!
//! Producers are the control channel and the hosted plugin's own editor
//! (through the control identity's edit callbacks). The single consumer is
//! the real-time audio callback, which drains everything once per block.
//!
//! Pushes take the lock for a short critical section. Drains only ever
//! `try_lock`: when a producer holds the lock the drain returns nothing for
//! this block and the entries stay queued for the next one.

use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::MAX_PENDING_PARAM_CHANGES;

/// One queued `(parameter id, normalized value)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamChange {
    pub id: u32,
    pub value: f64,
}

/// Bounded FIFO of [`ParamChange`]s shared between threads.
pub struct ParamQueue {
    pending: Mutex<Vec<ParamChange>>,
    capacity: usize,
    /// Set on the first dropped push, cleared by [`ParamQueue::clear`].
    overflowed: AtomicBool,
}

impl ParamQueue {
    /// Create a queue bounded at [`MAX_PENDING_PARAM_CHANGES`].
    pub fn new() -> Self {
        Self::with_capacity(MAX_PENDING_PARAM_CHANGES)
    }

    /// Create a queue with an explicit bound.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(Vec::with_capacity(capacity.min(1024))),
            capacity,
            overflowed: AtomicBool::new(false),
        }
    }

    /// Queue a change. Returns `false` if the queue is full and the change
    /// was dropped.
    pub fn push(&self, id: u32, value: f64) -> bool {
        let mut pending = self.pending.lock();
        if pending.len() >= self.capacity {
            drop(pending);
            if !self.overflowed.swap(true, Ordering::Relaxed) {
                warn!(
                    "Parameter change queue full ({} entries), dropping new changes",
                    self.capacity
                );
            }
            return false;
        }
        pending.push(ParamChange { id, value });
        true
    }

    /// Move every queued change into `out` (which is cleared first).
    ///
    /// Never blocks. If the lock is contended `out` stays empty and nothing
    /// is lost. Swapping buffers keeps the caller's allocation in circulation,
    /// so a drain does not allocate once `out` has grown.
    pub fn drain_into(&self, out: &mut Vec<ParamChange>) {
        out.clear();
        if let Some(mut pending) = self.pending.try_lock() {
            std::mem::swap(&mut *pending, out);
        }
    }

    /// Drop everything queued and re-arm the overflow warning.
    pub fn clear(&self) {
        self.pending.lock().clear();
        self.overflowed.store(false, Ordering::Relaxed);
    }

    /// Number of queued changes.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bound this queue enforces.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once a push has been dropped since the last clear.
    pub fn has_overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Relaxed)
    }
}

impl Default for ParamQueue {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
