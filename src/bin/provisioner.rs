//! Host-based provisioning demo.
//!
//! Runs the full provisioning flow against the host fakes: a scripted WiFi
//! link, an in-memory credential store, a logging LED, and a logging
//! telemetry publisher. The portal and DNS responder bind real sockets on
//! unprivileged ports so the flow can be exercised with a browser and dig.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin provisioner
//! # then submit credentials:
//! curl -d 'ssid=Home&pass=secret' http://127.0.0.1:8080/connect
//! ```

use log::info;
use std::time::Duration;
use wifi_provisioner::host::{LinkScript, LogLed, LogTelemetry, ScriptedLink, SharedStore};
use wifi_provisioner::{Blinker, IndicatorHandle, OrchestratorConfig, WifiOrchestrator};

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== WiFi provisioner demo starting ===");

    // Unprivileged ports; the portal IP stays the canonical AP address even
    // though the host fakes never configure an interface for it.
    let config = OrchestratorConfig {
        http_bind: "0.0.0.0:8080".parse().expect("static address"),
        dns_bind: "0.0.0.0:5353".parse().expect("static address"),
        ..OrchestratorConfig::default()
    };

    let (link, events) = ScriptedLink::new(LinkScript::Accept);
    let indicator = IndicatorHandle::new();
    let _blinker = Blinker::spawn(indicator.clone(), LogLed);

    let mut orchestrator = WifiOrchestrator::new(
        config,
        link,
        events,
        SharedStore::new(),
        LogTelemetry::new(),
        indicator,
    );
    orchestrator.start();
    orchestrator.launch_saved_mode();

    if let Some(addr) = orchestrator.portal_addr() {
        info!("captive portal listening on http://{}", addr);
    }
    if let Some(addr) = orchestrator.dns_addr() {
        info!("DNS responder listening on {}", addr);
    }

    info!("Entering main loop (Ctrl+C to exit)...");

    let mut heartbeat_counter = 0u64;
    loop {
        std::thread::sleep(Duration::from_secs(5));
        heartbeat_counter += 1;
        if heartbeat_counter % 12 == 0 {
            info!(
                "Heartbeat: {} min up, mode {}",
                heartbeat_counter / 12,
                orchestrator.mode()
            );
        }
    }
}
