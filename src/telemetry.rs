//! Telemetry collaborator contract and state payload codec.
//!
//! The orchestrator starts the publisher exactly when client mode is
//! entered and stops it when client mode is left; nothing else couples the
//! two. The payload format is a JSON object carrying one "ON"/"OFF" string
//! per output channel, mirrored into a channel bitmask.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Number of switchable output channels on the device.
pub const CHANNEL_COUNT: u8 = 3;

/// External publish/subscribe client, started/stopped on client-mode
/// entry/exit.
pub trait TelemetryPublisher: Send + 'static {
    /// Bring the publisher up. Called on client-mode entry.
    fn start(&mut self);

    /// Tear the publisher down. Called on client-mode exit.
    fn stop(&mut self);
}

/// JSON shape of the state payload: `{"states":["ON","OFF","ON"]}`.
#[derive(Debug, Serialize, Deserialize)]
struct StatePayload {
    states: Vec<String>,
}

/// Errors from the state payload codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// The payload is not valid JSON or lacks the `states` array.
    Malformed(String),
    /// The decoded state sets bits beyond [`CHANNEL_COUNT`].
    OutOfRange(u8),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed state payload: {}", msg),
            Self::OutOfRange(state) => write!(f, "state {:#04x} exceeds channel count", state),
        }
    }
}

impl std::error::Error for PayloadError {}

/// Encode a channel bitmask as the JSON state payload.
pub fn build_state_json(state: u8) -> Result<String, PayloadError> {
    if state >= 1 << CHANNEL_COUNT {
        return Err(PayloadError::OutOfRange(state));
    }
    let payload = StatePayload {
        states: (0..CHANNEL_COUNT)
            .map(|i| if state & (1 << i) != 0 { "ON" } else { "OFF" }.to_string())
            .collect(),
    };
    serde_json::to_string(&payload).map_err(|e| PayloadError::Malformed(e.to_string()))
}

/// Decode the JSON state payload into a channel bitmask.
///
/// Entries beyond [`CHANNEL_COUNT`] are ignored; entries that are not the
/// string "ON" leave their bit clear (unknown strings are logged, not
/// fatal).
pub fn parse_state_json(json: &str) -> Result<u8, PayloadError> {
    let payload: StatePayload =
        serde_json::from_str(json).map_err(|e| PayloadError::Malformed(e.to_string()))?;

    let mut state = 0u8;
    for (i, entry) in payload.states.iter().take(CHANNEL_COUNT as usize).enumerate() {
        match entry.as_str() {
            "ON" => state |= 1 << i,
            "OFF" => {}
            other => warn!("unknown state entry '{}' at index {}", other, i),
        }
    }
    Ok(state)
}

/// Aggregated output state shared between the trigger collaborator and the
/// telemetry side. A single atomic, because the access pattern is a tight
/// read-modify-write from a polling loop.
#[derive(Debug, Default)]
pub struct ToggleState {
    bits: AtomicU8,
}

impl ToggleState {
    /// Create with all channels off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one channel; returns the new aggregate mask. Channels beyond
    /// [`CHANNEL_COUNT`] are ignored.
    pub fn toggle(&self, channel: u8) -> u8 {
        if channel >= CHANNEL_COUNT {
            warn!("ignoring toggle for channel {}", channel);
            return self.get();
        }
        self.bits.fetch_xor(1 << channel, Ordering::AcqRel) ^ (1 << channel)
    }

    /// Replace the aggregate mask (e.g. from a received payload).
    pub fn set(&self, mask: u8) {
        self.bits.store(mask & ((1 << CHANNEL_COUNT) - 1), Ordering::Release);
    }

    /// Current aggregate mask.
    pub fn get(&self) -> u8 {
        self.bits.load(Ordering::Acquire)
    }
}
