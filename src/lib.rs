//! Headless WiFi provisioning library.
//!
//! A device with no display or input ships unconfigured; this crate runs the
//! captive-portal provisioning flow that gets it onto a network. In
//! provisioning mode the device hosts its own access point, answers every
//! DNS query with the portal address, and serves a credential form over
//! HTTP. A submission drives a client-mode connection attempt with a
//! bounded wait; failure falls back to provisioning, success persists the
//! credentials and starts telemetry.
//!
//! The platform-specific pieces (WiFi driver, key-value storage, LED,
//! telemetry transport) sit behind traits, so the whole flow runs on a host
//! machine against the fakes in [`host`].

pub mod channel;
pub mod config;
pub mod credentials;
pub mod dns;
pub mod host;
pub mod indicator;
pub mod link;
pub mod mode;
pub mod orchestrator;
pub mod portal;
pub mod storage;
pub mod telemetry;

// Re-export commonly used items
pub use channel::CredentialChannel;
pub use config::{ApConfig, OrchestratorConfig};
pub use credentials::{Credentials, CredentialsError};
pub use indicator::{Blinker, IndicatorHandle, IndicatorMode, Led};
pub use link::{LinkError, NetworkLink};
pub use mode::{ConnectionOutcome, ModeTransitionRequest, NetworkEvent, NetworkMode};
pub use orchestrator::WifiOrchestrator;
pub use storage::{CredentialStore, StoreError};
pub use telemetry::{TelemetryPublisher, ToggleState};
