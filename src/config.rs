//! Compile-time configuration for the provisioning subsystem.
//!
//! These constants describe the temporary access point, the portal's fixed
//! address, and the timing envelope of the mode state machine. Listener bind
//! addresses are runtime parameters (see [`OrchestratorConfig`]) so tests can
//! use ephemeral ports.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// SSID of the temporary provisioning access point.
pub const AP_SSID: &str = "Provisioner-Setup";

/// Passphrase of the provisioning access point (WPA2; empty means open).
pub const AP_PASSPHRASE: &str = "12345678";

/// WiFi channel used by the provisioning access point.
pub const AP_CHANNEL: u8 = 1;

/// Maximum simultaneous stations on the provisioning access point.
pub const AP_MAX_CLIENTS: u8 = 4;

/// Fixed IPv4 address of the portal while the access point is up.
/// Every hijacked DNS answer carries this address.
pub const PORTAL_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

/// Default captive portal HTTP port.
pub const HTTP_PORT: u16 = 80;

/// Default DNS hijack port.
pub const DNS_PORT: u16 = 53;

/// How long a client-mode connection attempt may wait for an address.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Indicator blink interval after falling back to provisioning mode.
pub const INDICATOR_FALLBACK_MS: u64 = 400;

/// Indicator blink interval while reconnecting after link loss.
pub const INDICATOR_RECONNECT_MS: u64 = 1000;

/// Upper bound on a `POST /connect` body. Larger bodies are rejected
/// before any of the payload is read.
pub const MAX_BODY_LEN: usize = 1024;

/// Receive poll interval for listener loops. Bounds how long a server
/// thread can take to notice its stop flag.
pub const SOCKET_POLL: Duration = Duration::from_millis(500);

/// How long `stop()` waits for a subordinate thread's completion signal
/// before declaring it stuck.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Number of portal threads accepting HTTP requests concurrently.
pub const PORTAL_WORKERS: usize = 4;

/// Access point parameters handed to the network link when entering
/// provisioning mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApConfig {
    /// Network name broadcast by the access point.
    pub ssid: String,
    /// WPA2 passphrase; empty selects an open network.
    pub passphrase: String,
    /// WiFi channel.
    pub channel: u8,
    /// Maximum simultaneous stations.
    pub max_clients: u8,
}

impl Default for ApConfig {
    fn default() -> Self {
        Self {
            ssid: AP_SSID.to_string(),
            passphrase: AP_PASSPHRASE.to_string(),
            channel: AP_CHANNEL,
            max_clients: AP_MAX_CLIENTS,
        }
    }
}

/// Runtime configuration for the orchestrator and its two servers.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Access point parameters for provisioning mode.
    pub ap: ApConfig,
    /// Address the DNS hijack answers point at.
    pub portal_ip: Ipv4Addr,
    /// Bind address of the captive portal HTTP listener.
    pub http_bind: SocketAddr,
    /// Bind address of the DNS hijack listener.
    pub dns_bind: SocketAddr,
    /// Timeout for a client-mode connection attempt.
    pub connect_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            ap: ApConfig::default(),
            portal_ip: PORTAL_IP,
            http_bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, HTTP_PORT)),
            dns_bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DNS_PORT)),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}
