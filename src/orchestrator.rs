//! WiFi mode orchestration.
//!
//! The orchestrator is the sole arbiter of the device's [`NetworkMode`]. It
//! owns the two provisioning servers, the network link, persistence, the
//! status indicator, and the telemetry collaborator, and it runs two
//! threads:
//!
//! - the **connection worker**, idle on the credential channel, which
//!   executes client-mode connection attempts with a bounded wait and falls
//!   back to provisioning mode on failure;
//! - the **event loop**, which consumes typed [`NetworkEvent`]s from the
//!   link: connection outcomes are forwarded to the waiting worker, link
//!   loss triggers an in-place reconnect that never leaves client mode.
//!
//! A mode transition always tears the previous mode down completely before
//! the next mode's infrastructure comes up, and credentials are persisted
//! only after a connection is confirmed.

use crate::channel::CredentialChannel;
use crate::config::{OrchestratorConfig, INDICATOR_FALLBACK_MS, INDICATOR_RECONNECT_MS, SOCKET_POLL};
use crate::credentials::Credentials;
use crate::dns::DnsResponder;
use crate::indicator::{IndicatorHandle, IndicatorMode};
use crate::link::NetworkLink;
use crate::mode::{ConnectionOutcome, ModeTransitionRequest, NetworkEvent, NetworkMode};
use crate::portal::CaptivePortal;
use crate::storage::{load_credentials, save_credentials, CredentialStore};
use crate::telemetry::TelemetryPublisher;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Mode state owned by the orchestrator. Mutated only under its lock, so
/// observers never see a half-built transition.
struct ModeState {
    mode: NetworkMode,
}

/// One-shot, auto-reset slot for the outcome of a connection attempt.
///
/// The event loop raises it, the connection worker waits on it with a
/// bounded timeout. Equivalent of a single event-group bit.
struct OutcomeSignal {
    slot: Mutex<Option<ConnectionOutcome>>,
    raised: Condvar,
}

impl OutcomeSignal {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            raised: Condvar::new(),
        }
    }

    /// Discard any stale outcome before a new attempt.
    fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn raise(&self, outcome: ConnectionOutcome) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(outcome);
        self.raised.notify_all();
    }

    /// Wait up to `timeout` for an outcome; elapsing yields
    /// [`ConnectionOutcome::TimedOut`]. Consuming resets the slot.
    fn wait(&self, timeout: Duration) -> ConnectionOutcome {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return ConnectionOutcome::TimedOut;
            };
            let (guard, _) = self
                .raised
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }
    }
}

struct Inner<L, S, T> {
    config: OrchestratorConfig,
    state: Mutex<ModeState>,
    link: Mutex<L>,
    store: Mutex<S>,
    telemetry: Mutex<T>,
    indicator: IndicatorHandle,
    channel: Arc<CredentialChannel>,
    dns: DnsResponder,
    portal: CaptivePortal,
    outcome: OutcomeSignal,
    running: AtomicBool,
}

impl<L, S, T> Inner<L, S, T>
where
    L: NetworkLink,
    S: CredentialStore,
    T: TelemetryPublisher,
{
    fn lock_state(&self) -> MutexGuard<'_, ModeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_link(&self) -> MutexGuard<'_, L> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_store(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_telemetry(&self) -> MutexGuard<'_, T> {
        self.telemetry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tear down whatever the previous mode left live: both provisioning
    /// servers and the network interface. Always runs to completion before
    /// any new-mode infrastructure starts.
    fn teardown_previous(&self, state: &mut ModeState) {
        self.portal.stop();
        self.dns.stop();
        self.lock_link().shutdown();
        state.mode = NetworkMode::Uninitialized;
    }

    /// Enter provisioning mode unconditionally: fresh access point, both
    /// servers up, fast-blink indicator, telemetry down.
    fn enter_provisioning(&self) {
        let mut state = self.lock_state();
        info!("entering provisioning mode");
        self.teardown_previous(&mut state);

        if let Err(e) = self.lock_link().start_access_point(&self.config.ap) {
            // Degraded: keep going so the servers can still be reached on
            // whatever interface exists.
            error!("failed to start access point: {}", e);
        }
        self.dns.start(self.config.dns_bind);
        self.portal.start(self.config.http_bind);
        self.indicator.set(IndicatorMode::Blink(INDICATOR_FALLBACK_MS));
        self.lock_telemetry().stop();
        state.mode = NetworkMode::Provisioning;
    }

    /// Run one client-mode connection attempt to completion.
    fn attempt_client(&self, credentials: Credentials) {
        info!("connection attempt for '{}'", credentials.identity);
        self.outcome.clear();
        {
            let mut state = self.lock_state();
            self.teardown_previous(&mut state);
            if let Err(e) = self.lock_link().start_client(&credentials) {
                error!("failed to start client networking: {}", e);
                drop(state);
                self.enter_provisioning();
                return;
            }
        }

        // The state lock is not held while waiting, so a forced
        // provisioning request stays immediate.
        let outcome = self.outcome.wait(self.config.connect_timeout);

        let mut state = self.lock_state();
        if state.mode != NetworkMode::Uninitialized {
            warn!(
                "mode changed to {} during connection attempt, discarding outcome",
                state.mode
            );
            return;
        }

        match outcome {
            ConnectionOutcome::Acquired(address) => {
                info!("client mode connected, address {}", address);
                self.portal.stop();
                self.dns.stop();
                self.indicator.set(IndicatorMode::SteadyOn);
                self.lock_telemetry().start();
                if let Err(e) = save_credentials(&mut *self.lock_store(), &credentials) {
                    // The connection stands even if the write failed.
                    warn!("failed to persist credentials: {}", e);
                }
                state.mode = NetworkMode::Client;
            }
            failed @ (ConnectionOutcome::TimedOut | ConnectionOutcome::Rejected) => {
                error!(
                    "connection attempt for '{}' failed: {:?}",
                    credentials.identity, failed
                );
                drop(state);
                self.enter_provisioning();
            }
        }
    }

    fn handle_request(&self, request: ModeTransitionRequest) {
        match request.target {
            NetworkMode::Client => match request.credentials {
                Some(credentials) if credentials.has_identity() => {
                    self.attempt_client(credentials);
                }
                _ => warn!("client mode request without a usable identity dropped"),
            },
            NetworkMode::Provisioning => self.enter_provisioning(),
            NetworkMode::Uninitialized => {
                warn!("uninitialized is not a requestable mode");
            }
        }
    }

    fn handle_event(&self, event: NetworkEvent) {
        match event {
            NetworkEvent::AddressAcquired(address) => {
                if self.lock_state().mode == NetworkMode::Client {
                    // Reconnect after link loss succeeded.
                    info!("client link restored, address {}", address);
                    self.indicator.set(IndicatorMode::SteadyOn);
                } else {
                    self.outcome.raise(ConnectionOutcome::Acquired(address));
                }
            }
            NetworkEvent::ConnectionRefused => {
                self.outcome.raise(ConnectionOutcome::Rejected);
            }
            NetworkEvent::Disconnected => {
                if self.lock_state().mode == NetworkMode::Client {
                    // Link loss is not a mode transition: stay in client
                    // mode and retry with the configured identity.
                    warn!("client link lost, reconnecting");
                    self.indicator.set(IndicatorMode::Blink(INDICATOR_RECONNECT_MS));
                    if let Err(e) = self.lock_link().reconnect() {
                        error!("reconnect attempt failed: {}", e);
                    }
                } else {
                    debug!("disconnect event outside client mode ignored");
                }
            }
        }
    }
}

/// The mode state machine. See the module docs for the threading model.
pub struct WifiOrchestrator<L, S, T>
where
    L: NetworkLink,
    S: CredentialStore,
    T: TelemetryPublisher,
{
    inner: Arc<Inner<L, S, T>>,
    events: Option<Receiver<NetworkEvent>>,
    worker: Option<thread::JoinHandle<()>>,
    event_loop: Option<thread::JoinHandle<()>>,
}

impl<L, S, T> WifiOrchestrator<L, S, T>
where
    L: NetworkLink,
    S: CredentialStore,
    T: TelemetryPublisher,
{
    /// Create the orchestrator around its collaborators. `events` is the
    /// receiving end of the link's event stream. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(
        config: OrchestratorConfig,
        link: L,
        events: Receiver<NetworkEvent>,
        store: S,
        telemetry: T,
        indicator: IndicatorHandle,
    ) -> Self {
        let channel = Arc::new(CredentialChannel::new());
        let portal = CaptivePortal::new(Arc::clone(&channel));
        let dns = DnsResponder::new(config.portal_ip);

        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(ModeState {
                    mode: NetworkMode::Uninitialized,
                }),
                link: Mutex::new(link),
                store: Mutex::new(store),
                telemetry: Mutex::new(telemetry),
                indicator,
                channel,
                dns,
                portal,
                outcome: OutcomeSignal::new(),
                running: AtomicBool::new(false),
            }),
            events: Some(events),
            worker: None,
            event_loop: None,
        }
    }

    /// Spawn the connection worker and the event loop.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            warn!("orchestrator already started");
            return;
        }
        let Some(events) = self.events.take() else {
            error!("orchestrator cannot restart, event stream consumed");
            return;
        };
        self.inner.running.store(true, Ordering::Release);

        let worker_inner = Arc::clone(&self.inner);
        self.worker = Some(thread::spawn(move || {
            while worker_inner.running.load(Ordering::Acquire) {
                if let Some(request) = worker_inner.channel.recv_timeout(SOCKET_POLL) {
                    worker_inner.handle_request(request);
                }
            }
            debug!("connection worker exiting");
        }));

        let event_inner = Arc::clone(&self.inner);
        self.event_loop = Some(thread::spawn(move || {
            loop {
                if !event_inner.running.load(Ordering::Acquire) {
                    break;
                }
                match events.recv_timeout(SOCKET_POLL) {
                    Ok(event) => event_inner.handle_event(event),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        info!("network event stream closed");
                        break;
                    }
                }
            }
            debug!("event loop exiting");
        }));
    }

    /// Boot entry point: join the stored network if a usable identity is
    /// persisted, otherwise open provisioning mode.
    pub fn launch_saved_mode(&self) {
        let stored = load_credentials(&*self.inner.lock_store());
        match stored {
            Some(credentials) => {
                info!(
                    "stored identity '{}' found, attempting client mode",
                    credentials.identity
                );
                self.request_mode(NetworkMode::Client, Some(credentials));
            }
            None => {
                info!("no stored identity, opening provisioning mode");
                self.request_mode(NetworkMode::Provisioning, None);
            }
        }
    }

    /// Request a mode change.
    ///
    /// A client request is queued for the connection worker through the
    /// single-slot channel; if a request is already pending the new one is
    /// dropped (logged, not escalated). A provisioning request transitions
    /// immediately and unconditionally on the calling thread — this is the
    /// entry point the external hold-trigger uses.
    pub fn request_mode(&self, target: NetworkMode, credentials: Option<Credentials>) {
        match target {
            NetworkMode::Client => match credentials {
                Some(credentials) if credentials.has_identity() => {
                    self.inner
                        .channel
                        .try_send(ModeTransitionRequest::client(credentials));
                }
                _ => warn!("client mode request requires a non-empty identity"),
            },
            NetworkMode::Provisioning => {
                info!("provisioning mode forced");
                self.inner.enter_provisioning();
            }
            NetworkMode::Uninitialized => {
                warn!("uninitialized is not a requestable mode");
            }
        }
    }

    /// The current network mode.
    pub fn mode(&self) -> NetworkMode {
        self.inner.lock_state().mode
    }

    /// Bound address of the captive portal, while provisioning is active.
    pub fn portal_addr(&self) -> Option<SocketAddr> {
        self.inner.portal.local_addr()
    }

    /// Bound address of the DNS responder, while provisioning is active.
    pub fn dns_addr(&self) -> Option<SocketAddr> {
        self.inner.dns.local_addr()
    }

    /// The credential handoff slot (the portal's submission path).
    pub fn channel(&self) -> Arc<CredentialChannel> {
        Arc::clone(&self.inner.channel)
    }

    /// Stop both threads and tear down all networking. Blocks until the
    /// worker finishes any in-flight connection attempt.
    pub fn shutdown(&mut self) {
        if self.worker.is_none() && self.event_loop.is_none() {
            return;
        }
        info!("orchestrator shutting down");
        self.inner.running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.event_loop.take() {
            let _ = handle.join();
        }
        let mut state = self.inner.lock_state();
        self.inner.teardown_previous(&mut state);
        drop(state);
        self.inner.indicator.set(IndicatorMode::SteadyOff);
    }
}

impl<L, S, T> Drop for WifiOrchestrator<L, S, T>
where
    L: NetworkLink,
    S: CredentialStore,
    T: TelemetryPublisher,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{LinkScript, LogTelemetry, ScriptedLink, SharedStore};
    use std::net::Ipv4Addr;

    fn test_config(timeout: Duration) -> OrchestratorConfig {
        OrchestratorConfig {
            http_bind: "127.0.0.1:0".parse().unwrap(),
            dns_bind: "127.0.0.1:0".parse().unwrap(),
            connect_timeout: timeout,
            ..OrchestratorConfig::default()
        }
    }

    fn wait_for<F: Fn() -> bool>(predicate: F, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if predicate() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        predicate()
    }

    // ==================== OutcomeSignal ====================

    #[test]
    fn test_signal_timeout() {
        let signal = OutcomeSignal::new();
        assert_eq!(
            signal.wait(Duration::from_millis(20)),
            ConnectionOutcome::TimedOut
        );
    }

    #[test]
    fn test_signal_raise_then_wait() {
        let signal = OutcomeSignal::new();
        let address = Ipv4Addr::new(10, 0, 0, 2);
        signal.raise(ConnectionOutcome::Acquired(address));
        assert_eq!(
            signal.wait(Duration::from_millis(20)),
            ConnectionOutcome::Acquired(address)
        );
        // Auto-reset: consumed outcome is gone.
        assert_eq!(
            signal.wait(Duration::from_millis(20)),
            ConnectionOutcome::TimedOut
        );
    }

    #[test]
    fn test_signal_clear_discards_stale() {
        let signal = OutcomeSignal::new();
        signal.raise(ConnectionOutcome::Rejected);
        signal.clear();
        assert_eq!(
            signal.wait(Duration::from_millis(20)),
            ConnectionOutcome::TimedOut
        );
    }

    #[test]
    fn test_signal_cross_thread() {
        let signal = Arc::new(OutcomeSignal::new());
        let raiser = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                signal.raise(ConnectionOutcome::Rejected);
            })
        };
        assert_eq!(
            signal.wait(Duration::from_secs(2)),
            ConnectionOutcome::Rejected
        );
        raiser.join().unwrap();
    }

    // ==================== mode transitions ====================

    #[test]
    fn test_boot_without_credentials_enters_provisioning() {
        let (link, events) = ScriptedLink::new(LinkScript::Accept);
        let mut orchestrator = WifiOrchestrator::new(
            test_config(Duration::from_millis(300)),
            link,
            events,
            SharedStore::new(),
            LogTelemetry::new(),
            IndicatorHandle::new(),
        );
        orchestrator.start();
        orchestrator.launch_saved_mode();

        assert_eq!(orchestrator.mode(), NetworkMode::Provisioning);
        assert!(orchestrator.portal_addr().is_some());
        assert!(orchestrator.dns_addr().is_some());
        orchestrator.shutdown();
    }

    #[test]
    fn test_client_request_with_empty_identity_dropped() {
        let (link, events) = ScriptedLink::new(LinkScript::Accept);
        let orchestrator = WifiOrchestrator::new(
            test_config(Duration::from_millis(300)),
            link,
            events,
            SharedStore::new(),
            LogTelemetry::new(),
            IndicatorHandle::new(),
        );
        orchestrator.request_mode(NetworkMode::Client, None);
        orchestrator.request_mode(
            NetworkMode::Client,
            Some(Credentials::from_form("", "pw")),
        );
        assert!(!orchestrator.channel().is_pending());
    }

    #[test]
    fn test_successful_connection_enters_client_mode() {
        let (link, events) = ScriptedLink::new(LinkScript::Accept);
        let store = SharedStore::new();
        let telemetry = LogTelemetry::new();
        let indicator = IndicatorHandle::new();
        let mut orchestrator = WifiOrchestrator::new(
            test_config(Duration::from_secs(5)),
            link,
            events,
            store.clone(),
            telemetry.clone(),
            indicator.clone(),
        );
        orchestrator.start();
        orchestrator.request_mode(
            NetworkMode::Client,
            Some(Credentials::new("Home", "secret!").unwrap()),
        );

        assert!(wait_for(
            || orchestrator.mode() == NetworkMode::Client,
            Duration::from_secs(5)
        ));
        assert_eq!(store.peek("identity").as_deref(), Some("Home"));
        assert_eq!(store.peek("secret").as_deref(), Some("secret!"));
        assert!(telemetry.is_started());
        assert_eq!(indicator.get(), IndicatorMode::SteadyOn);
        // Provisioning servers are down in client mode.
        assert!(orchestrator.portal_addr().is_none());
        assert!(orchestrator.dns_addr().is_none());
        orchestrator.shutdown();
    }

    #[test]
    fn test_timeout_falls_back_without_persisting() {
        let (link, events) = ScriptedLink::new(LinkScript::Ignore);
        let store = SharedStore::new();
        let indicator = IndicatorHandle::new();
        let mut orchestrator = WifiOrchestrator::new(
            test_config(Duration::from_millis(200)),
            link,
            events,
            store.clone(),
            LogTelemetry::new(),
            indicator.clone(),
        );
        orchestrator.start();
        orchestrator.request_mode(
            NetworkMode::Client,
            Some(Credentials::new("Nowhere", "pw").unwrap()),
        );

        assert!(wait_for(
            || orchestrator.mode() == NetworkMode::Provisioning,
            Duration::from_secs(5)
        ));
        assert!(store.peek("identity").is_none());
        assert_eq!(indicator.get(), IndicatorMode::Blink(INDICATOR_FALLBACK_MS));
        orchestrator.shutdown();
    }

    #[test]
    fn test_rejection_falls_back() {
        let (link, events) = ScriptedLink::new(LinkScript::Refuse);
        let store = SharedStore::new();
        let mut orchestrator = WifiOrchestrator::new(
            test_config(Duration::from_secs(5)),
            link,
            events,
            store.clone(),
            LogTelemetry::new(),
            IndicatorHandle::new(),
        );
        orchestrator.start();
        orchestrator.request_mode(
            NetworkMode::Client,
            Some(Credentials::new("Refused", "pw").unwrap()),
        );

        assert!(wait_for(
            || orchestrator.mode() == NetworkMode::Provisioning,
            Duration::from_secs(5)
        ));
        assert!(store.peek("identity").is_none());
        orchestrator.shutdown();
    }

    #[test]
    fn test_force_provisioning_recreates_interfaces() {
        let (link, events) = ScriptedLink::new(LinkScript::Accept);
        let calls = link.calls();
        let telemetry = LogTelemetry::new();
        let mut orchestrator = WifiOrchestrator::new(
            test_config(Duration::from_secs(5)),
            link,
            events,
            SharedStore::new(),
            telemetry.clone(),
            IndicatorHandle::new(),
        );
        orchestrator.start();
        orchestrator.request_mode(
            NetworkMode::Client,
            Some(Credentials::new("Home", "pw").unwrap()),
        );
        assert!(wait_for(
            || orchestrator.mode() == NetworkMode::Client,
            Duration::from_secs(5)
        ));

        orchestrator.request_mode(NetworkMode::Provisioning, None);
        assert_eq!(orchestrator.mode(), NetworkMode::Provisioning);
        assert!(!telemetry.is_started());

        // The client interface was destroyed before the fresh AP came up.
        let calls = calls.lock().unwrap();
        let client_at = calls
            .iter()
            .position(|c| matches!(c, crate::host::LinkCall::ClientStart(_)))
            .expect("client start");
        let shutdown_after = calls[client_at..]
            .iter()
            .position(|c| *c == crate::host::LinkCall::Shutdown)
            .expect("shutdown after client start");
        let ap_after = calls[client_at..]
            .iter()
            .position(|c| matches!(c, crate::host::LinkCall::ApStart(_)))
            .expect("AP start after client start");
        assert!(shutdown_after < ap_after);
        drop(calls);
        orchestrator.shutdown();
    }

    #[test]
    fn test_link_loss_reconnects_in_client_mode() {
        let (link, events) = ScriptedLink::new(LinkScript::Accept);
        let calls = link.calls();
        let event_tx = link.event_sender();
        let indicator = IndicatorHandle::new();
        let mut orchestrator = WifiOrchestrator::new(
            test_config(Duration::from_secs(5)),
            link,
            events,
            SharedStore::new(),
            LogTelemetry::new(),
            indicator.clone(),
        );
        orchestrator.start();
        orchestrator.request_mode(
            NetworkMode::Client,
            Some(Credentials::new("Home", "pw").unwrap()),
        );
        assert!(wait_for(
            || orchestrator.mode() == NetworkMode::Client,
            Duration::from_secs(5)
        ));

        event_tx.send(NetworkEvent::Disconnected).unwrap();
        assert!(wait_for(
            || {
                calls
                    .lock()
                    .unwrap()
                    .contains(&crate::host::LinkCall::Reconnect)
            },
            Duration::from_secs(5)
        ));
        // No mode transition happened.
        assert_eq!(orchestrator.mode(), NetworkMode::Client);
        // The scripted link re-acquires on reconnect, restoring steady-on.
        assert!(wait_for(
            || indicator.get() == IndicatorMode::SteadyOn,
            Duration::from_secs(5)
        ));
        orchestrator.shutdown();
    }

    #[test]
    fn test_boot_with_stored_credentials_joins_network() {
        let (link, events) = ScriptedLink::new(LinkScript::Accept);
        let mut store = SharedStore::new();
        store.set("identity", "Saved").unwrap();
        store.set("secret", "pw").unwrap();

        let mut orchestrator = WifiOrchestrator::new(
            test_config(Duration::from_secs(5)),
            link,
            events,
            store,
            LogTelemetry::new(),
            IndicatorHandle::new(),
        );
        orchestrator.start();
        orchestrator.launch_saved_mode();

        assert!(wait_for(
            || orchestrator.mode() == NetworkMode::Client,
            Duration::from_secs(5)
        ));
        orchestrator.shutdown();
    }

    #[test]
    fn test_failed_persist_keeps_connection() {
        let (link, events) = ScriptedLink::new(LinkScript::Accept);
        let mut store = MemoryFailingStore::default();
        store.0.fail_writes(true);
        let mut orchestrator = WifiOrchestrator::new(
            test_config(Duration::from_secs(5)),
            link,
            events,
            store,
            LogTelemetry::new(),
            IndicatorHandle::new(),
        );
        orchestrator.start();
        orchestrator.request_mode(
            NetworkMode::Client,
            Some(Credentials::new("Home", "pw").unwrap()),
        );
        assert!(wait_for(
            || orchestrator.mode() == NetworkMode::Client,
            Duration::from_secs(5)
        ));
        orchestrator.shutdown();
    }

    #[derive(Default)]
    struct MemoryFailingStore(crate::host::MemoryStore);

    impl CredentialStore for MemoryFailingStore {
        fn get(&self, key: &str) -> Result<String, crate::storage::StoreError> {
            self.0.get(key)
        }
        fn set(&mut self, key: &str, value: &str) -> Result<(), crate::storage::StoreError> {
            self.0.set(key, value)
        }
    }
}
