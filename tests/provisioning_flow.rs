//! End-to-end provisioning flow over real sockets.
//!
//! Drives the orchestrator with the host fakes: boots into provisioning
//! mode, talks to the captive portal and the DNS responder over loopback,
//! submits credentials, and checks the client-mode entry and fallback laws.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};
use wifi_provisioner::host::{LinkScript, LogTelemetry, ScriptedLink, SharedStore};
use wifi_provisioner::{
    IndicatorHandle, IndicatorMode, NetworkMode, OrchestratorConfig, WifiOrchestrator,
};

fn test_config(connect_timeout: Duration) -> OrchestratorConfig {
    OrchestratorConfig {
        http_bind: "127.0.0.1:0".parse().unwrap(),
        dns_bind: "127.0.0.1:0".parse().unwrap(),
        connect_timeout,
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

/// Minimal HTTP/1.0 exchange over a fresh connection.
fn http_request(addr: SocketAddr, method: &str, path: &str, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).expect("connect to portal");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let request = format!(
        "{} {} HTTP/1.0\r\nHost: portal\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
        method,
        path,
        body.len(),
        body
    );
    stream.write_all(request.as_bytes()).unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// One A query for `name`, returning the raw DNS response.
fn dns_query(addr: SocketAddr, name: &str) -> Vec<u8> {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind query socket");
    socket
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let mut query = vec![
        0xAB, 0xCD, // transaction id
        0x01, 0x00, // standard query, recursion desired
        0x00, 0x01, // QDCOUNT
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    for label in name.split('.') {
        query.push(label.len() as u8);
        query.extend_from_slice(label.as_bytes());
    }
    query.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x01]); // root, TYPE A, CLASS IN

    socket.send_to(&query, addr).unwrap();
    let mut response = [0u8; 512];
    let (len, _) = socket.recv_from(&mut response).unwrap();
    response[..len].to_vec()
}

#[test]
fn test_boot_serves_portal_and_hijacks_dns() {
    let (link, events) = ScriptedLink::new(LinkScript::Accept);
    let mut orchestrator = WifiOrchestrator::new(
        test_config(Duration::from_secs(5)),
        link,
        events,
        SharedStore::new(),
        LogTelemetry::new(),
        IndicatorHandle::new(),
    );
    orchestrator.start();
    orchestrator.launch_saved_mode();
    assert_eq!(orchestrator.mode(), NetworkMode::Provisioning);

    // Any GET serves the credential form (captive-portal probes included).
    let portal = orchestrator.portal_addr().expect("portal bound");
    let form = http_request(portal, "GET", "/generate_204", "");
    assert!(form.starts_with("HTTP/1.0 200") || form.starts_with("HTTP/1.1 200"));
    assert!(form.contains("name=\"ssid\""));

    // Every DNS name resolves to the portal address.
    let dns = orchestrator.dns_addr().expect("dns bound");
    let response = dns_query(dns, "connectivitycheck.gstatic.com");
    assert_eq!(&response[0..2], &[0xAB, 0xCD]);
    assert_eq!(&response[2..4], &[0x81, 0x80]);
    assert_eq!(&response[6..8], &[0x00, 0x01]); // one answer
    let rdata = &response[response.len() - 4..];
    assert_eq!(rdata, &[192, 168, 4, 1]);

    orchestrator.shutdown();
    assert!(orchestrator.portal_addr().is_none());
    assert!(orchestrator.dns_addr().is_none());
}

#[test]
fn test_submission_enters_client_mode_and_persists() {
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
    orchestrator.launch_saved_mode();

    let portal = orchestrator.portal_addr().expect("portal bound");
    let response = http_request(portal, "POST", "/connect", "ssid=My%20Router&pass=hunter%212");
    assert!(response.starts_with("HTTP/1.0 200") || response.starts_with("HTTP/1.1 200"));

    assert!(wait_for(
        || orchestrator.mode() == NetworkMode::Client,
        Duration::from_secs(5)
    ));
    assert_eq!(store.peek("identity").as_deref(), Some("My Router"));
    assert_eq!(store.peek("secret").as_deref(), Some("hunter!2"));
    assert!(telemetry.is_started());
    assert_eq!(indicator.get(), IndicatorMode::SteadyOn);
    // Both provisioning servers are torn down once connected.
    assert!(wait_for(
        || orchestrator.portal_addr().is_none() && orchestrator.dns_addr().is_none(),
        Duration::from_secs(5)
    ));
    orchestrator.shutdown();
}

#[test]
fn test_failed_attempt_falls_back_to_provisioning() {
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
    orchestrator.launch_saved_mode();

    let portal = orchestrator.portal_addr().expect("portal bound");
    http_request(portal, "POST", "/connect", "ssid=Nowhere&pass=pw");

    // The attempt tears the portal down, times out, and reopens it.
    assert!(wait_for(
        || orchestrator.mode() == NetworkMode::Provisioning && orchestrator.portal_addr().is_some(),
        Duration::from_secs(5)
    ));
    assert!(store.peek("identity").is_none());
    assert_eq!(indicator.get(), IndicatorMode::Blink(400));

    // The reopened portal accepts a fresh submission.
    let portal = orchestrator.portal_addr().expect("portal rebound");
    let form = http_request(portal, "GET", "/", "");
    assert!(form.contains("name=\"ssid\""));
    orchestrator.shutdown();
}

#[test]
fn test_link_loss_reconnects_without_leaving_client_mode() {
    let (link, events) = ScriptedLink::new(LinkScript::Accept);
    let drop_tx = link.event_sender();
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
    orchestrator.launch_saved_mode();

    let portal = orchestrator.portal_addr().expect("portal bound");
    http_request(portal, "POST", "/connect", "ssid=Home&pass=pw");
    assert!(wait_for(
        || orchestrator.mode() == NetworkMode::Client,
        Duration::from_secs(5)
    ));

    drop_tx
        .send(wifi_provisioner::NetworkEvent::Disconnected)
        .unwrap();
    // The scripted link re-acquires an address, restoring steady-on.
    assert!(wait_for(
        || indicator.get() == IndicatorMode::SteadyOn,
        Duration::from_secs(5)
    ));
    assert_eq!(orchestrator.mode(), NetworkMode::Client);
    // No provisioning infrastructure came back.
    assert!(orchestrator.portal_addr().is_none());
    orchestrator.shutdown();
}
