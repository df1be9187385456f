//! Network link abstraction.
//!
//! Wraps the platform WiFi driver behind a trait so the orchestrator can be
//! exercised on a host without hardware. The link reports asynchronous
//! happenings (address acquired, refusal, link loss) as [`NetworkEvent`]s
//! over a channel the orchestrator consumes in one place.

use crate::config::ApConfig;
use crate::credentials::Credentials;
use std::fmt;

/// Errors from driving the network link.
#[derive(Debug)]
pub enum LinkError {
    /// The supplied configuration was not accepted by the driver.
    InvalidConfig(String),
    /// The underlying driver failed.
    Driver(String),
    /// I/O error talking to the driver.
    Io(std::io::Error),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid link configuration: {}", msg),
            Self::Driver(msg) => write!(f, "driver error: {}", msg),
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Driver for the device's WiFi interfaces.
///
/// At most one interface is live at a time: `start_access_point` and
/// `start_client` each begin from a stopped driver, and `shutdown` tears
/// down whichever interface is up. Events are delivered out-of-band via the
/// receiver the concrete link hands out at construction.
pub trait NetworkLink: Send + 'static {
    /// Bring up the provisioning access point.
    fn start_access_point(&mut self, config: &ApConfig) -> Result<(), LinkError>;

    /// Begin a client-mode connection with `credentials`. The outcome
    /// arrives later as a [`crate::mode::NetworkEvent`].
    fn start_client(&mut self, credentials: &Credentials) -> Result<(), LinkError>;

    /// Re-issue a connection attempt with the already-configured
    /// credentials, after link loss.
    fn reconnect(&mut self) -> Result<(), LinkError>;

    /// Tear down whatever interface is currently live. Best-effort;
    /// never fails.
    fn shutdown(&mut self);
}
