//! Single-slot credential handoff.
//!
//! The portal hands submitted credentials to the orchestrator's connection
//! worker through a slot holding at most one pending request. Sends never
//! block: while a request is pending, later submissions are dropped (first
//! pending wins). Receives block, which is the worker's idle state.

use crate::mode::ModeTransitionRequest;
use log::warn;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A non-blocking-send, blocking-receive slot for one pending
/// [`ModeTransitionRequest`]. Created once, lives for the process lifetime.
#[derive(Debug, Default)]
pub struct CredentialChannel {
    slot: Mutex<Option<ModeTransitionRequest>>,
    available: Condvar,
}

impl CredentialChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a request without blocking.
    ///
    /// Returns `false` if an unconsumed request is already pending; the new
    /// request is dropped and the event logged, not escalated.
    pub fn try_send(&self, request: ModeTransitionRequest) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            warn!("credential channel full, dropping {} request", request.target);
            return false;
        }
        *slot = Some(request);
        self.available.notify_one();
        true
    }

    /// Block until a request is available and take it.
    pub fn recv(&self) -> ModeTransitionRequest {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(request) = slot.take() {
                return request;
            }
            slot = self
                .available
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block up to `timeout` for a request. Returns `None` on timeout so
    /// the worker can poll its stop flag.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ModeTransitionRequest> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(request) = slot.take() {
                return Some(request);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, result) = self
                .available
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
            if result.timed_out() && slot.is_none() {
                return None;
            }
        }
    }

    /// True when a request is pending.
    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
