//! Host-side implementations of the collaborator traits.
//!
//! No hardware here: an in-memory credential store, a logging LED, a
//! logging telemetry publisher, and a scripted network link whose behavior
//! is chosen up front. The demo binary runs on these, and tests use them to
//! drive the orchestrator end to end.

use crate::config::ApConfig;
use crate::credentials::Credentials;
use crate::indicator::Led;
use crate::link::{LinkError, NetworkLink};
use crate::mode::NetworkEvent;
use crate::storage::{CredentialStore, StoreError};
use crate::telemetry::TelemetryPublisher;
use log::{debug, info};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory key-value store, optionally failing on demand.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail with an I/O error.
    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Make every subsequent `set` fail with an I/O error.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<String, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Io("simulated read failure".to_string()));
        }
        self.values.get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Io("simulated write failure".to_string()));
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Shared handle to a [`MemoryStore`], so a test can inspect the store
/// while the orchestrator owns it.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<MemoryStore>>,
}

impl SharedStore {
    /// Create an empty shared store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a key, bypassing the trait (for assertions).
    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values
            .get(key)
            .cloned()
    }
}

impl CredentialStore for SharedStore {
    fn get(&self, key: &str) -> Result<String, StoreError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set(key, value)
    }
}

/// LED that logs transitions instead of driving a pin.
#[derive(Debug, Default)]
pub struct LogLed;

impl Led for LogLed {
    fn set(&mut self, on: bool) {
        debug!("LED {}", if on { "on" } else { "off" });
    }
}

/// Telemetry publisher that logs start/stop and remembers whether it is
/// running.
#[derive(Debug, Clone, Default)]
pub struct LogTelemetry {
    started: Arc<Mutex<bool>>,
}

impl LogTelemetry {
    /// Create a stopped publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// True after `start` without a matching `stop`.
    pub fn is_started(&self) -> bool {
        *self.started.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TelemetryPublisher for LogTelemetry {
    fn start(&mut self) {
        info!("telemetry publisher started");
        *self.started.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    fn stop(&mut self) {
        info!("telemetry publisher stopped");
        *self.started.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

/// How the scripted link reacts to a client-mode connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkScript {
    /// Immediately deliver an address-acquired event.
    Accept,
    /// Immediately deliver a connection-refused event.
    Refuse,
    /// Deliver nothing, driving the attempt into its timeout.
    Ignore,
}

/// One recorded call into the scripted link, for ordering assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCall {
    /// `start_access_point` with the given SSID.
    ApStart(String),
    /// `start_client` with the given identity.
    ClientStart(String),
    /// `reconnect`.
    Reconnect,
    /// `shutdown`.
    Shutdown,
}

/// Scripted network link for host runs and tests.
pub struct ScriptedLink {
    script: LinkScript,
    address: Ipv4Addr,
    events: Sender<NetworkEvent>,
    calls: Arc<Mutex<Vec<LinkCall>>>,
}

impl ScriptedLink {
    /// Create a link following `script`, together with the event stream
    /// the orchestrator consumes.
    pub fn new(script: LinkScript) -> (Self, Receiver<NetworkEvent>) {
        let (events, event_rx) = mpsc::channel();
        let link = Self {
            script,
            address: Ipv4Addr::new(192, 168, 1, 50),
            events,
            calls: Arc::new(Mutex::new(Vec::new())),
        };
        (link, event_rx)
    }

    /// Handle to the recorded call sequence.
    pub fn calls(&self) -> Arc<Mutex<Vec<LinkCall>>> {
        Arc::clone(&self.calls)
    }

    /// Inject a link-loss event, as if the joined network went away.
    pub fn drop_link(&self) {
        let _ = self.events.send(NetworkEvent::Disconnected);
    }

    /// A sender for injecting arbitrary events from a test.
    pub fn event_sender(&self) -> Sender<NetworkEvent> {
        self.events.clone()
    }

    fn record(&self, call: LinkCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl NetworkLink for ScriptedLink {
    fn start_access_point(&mut self, config: &ApConfig) -> Result<(), LinkError> {
        info!("scripted link: access point '{}' up", config.ssid);
        self.record(LinkCall::ApStart(config.ssid.clone()));
        Ok(())
    }

    fn start_client(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        info!("scripted link: connecting to '{}'", credentials.identity);
        self.record(LinkCall::ClientStart(credentials.identity.clone()));
        match self.script {
            LinkScript::Accept => {
                let _ = self.events.send(NetworkEvent::AddressAcquired(self.address));
            }
            LinkScript::Refuse => {
                let _ = self.events.send(NetworkEvent::ConnectionRefused);
            }
            LinkScript::Ignore => {}
        }
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), LinkError> {
        info!("scripted link: reconnecting");
        self.record(LinkCall::Reconnect);
        if self.script == LinkScript::Accept {
            let _ = self.events.send(NetworkEvent::AddressAcquired(self.address));
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        debug!("scripted link: shutdown");
        self.record(LinkCall::Shutdown);
    }
}
