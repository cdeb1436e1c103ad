//! Requests a worker makes of its host.
//!
//! A worker cannot promote itself or take over pages directly; it raises a
//! flag here and the registration acts on it at the next transition point.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct WorkerScope {
    skip_waiting: AtomicBool,
    claim: AtomicBool,
}

impl WorkerScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask to become active without waiting for old pages to close.
    pub fn skip_waiting(&self) {
        if !self.skip_waiting.swap(true, Ordering::SeqCst) {
            tracing::debug!("skip waiting requested");
        }
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Ask to control every open page once activation finishes.
    pub fn claim_clients(&self) {
        self.claim.store(true, Ordering::SeqCst);
    }

    /// Consume a pending claim request.
    pub(crate) fn take_claim(&self) -> bool {
        self.claim.swap(false, Ordering::SeqCst)
    }
}
