//! Network mode and transition types.
//!
//! The orchestrator is the sole owner of the current [`NetworkMode`]; every
//! change flows through a [`ModeTransitionRequest`]. Events coming up from
//! the network link are a closed enum matched at the single point the
//! orchestrator consumes them.

use crate::credentials::Credentials;
use std::fmt;
use std::net::Ipv4Addr;

/// The device's current networking role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    /// No networking configured yet (process start, or mid-transition).
    Uninitialized,
    /// Acting as its own access point, serving the provisioning portal.
    Provisioning,
    /// Joined an existing network as a station.
    Client,
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Provisioning => "provisioning",
            Self::Client => "client",
        };
        write!(f, "{}", name)
    }
}

/// A request to change the network mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeTransitionRequest {
    /// The mode to enter.
    pub target: NetworkMode,
    /// Credentials for a client-mode transition; `None` for provisioning.
    pub credentials: Option<Credentials>,
}

impl ModeTransitionRequest {
    /// Request entering client mode with the given credentials.
    pub fn client(credentials: Credentials) -> Self {
        Self {
            target: NetworkMode::Client,
            credentials: Some(credentials),
        }
    }

    /// Request entering provisioning mode.
    pub fn provisioning() -> Self {
        Self {
            target: NetworkMode::Provisioning,
            credentials: None,
        }
    }
}

/// Result of a single client-mode connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// An address was acquired within the timeout.
    Acquired(Ipv4Addr),
    /// No outcome arrived within the timeout.
    TimedOut,
    /// The network refused the connection.
    Rejected,
}

/// Events delivered by the network link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// Client-mode networking obtained an address.
    AddressAcquired(Ipv4Addr),
    /// The network refused the connection attempt.
    ConnectionRefused,
    /// An established client link dropped.
    Disconnected,
}
