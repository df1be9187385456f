//! DNS hijack responder.
//!
//! While provisioning mode is active, every DNS query received on the
//! configured UDP port is answered with a single A record pointing at the
//! portal's own address. This is deliberately wrong as a general DNS server
//! and exactly right for making captive-portal probes land on the device.
//!
//! The listener is a dedicated thread polling its socket with a bounded
//! receive timeout so it observes the stop flag promptly. `stop()` is
//! synchronous: it waits for the thread's completion signal (bounded) and
//! then joins it.

use crate::config::{SOCKET_POLL, STOP_TIMEOUT};
use log::{debug, error, info, warn};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

/// Size of the fixed DNS header.
const DNS_HEADER_SIZE: usize = 12;

/// TTL of the hijacked answer, in seconds.
const ANSWER_TTL: u32 = 60;

/// Largest datagram the responder will look at.
const MAX_DATAGRAM: usize = 512;

struct Listener {
    handle: thread::JoinHandle<()>,
    done_rx: mpsc::Receiver<()>,
}

/// UDP listener answering every query with the portal's address.
pub struct DnsResponder {
    portal_ip: Ipv4Addr,
    running: Arc<AtomicBool>,
    listener: Mutex<Option<Listener>>,
    bound: Mutex<Option<SocketAddr>>,
}

impl DnsResponder {
    /// Create a responder that answers with `portal_ip`.
    pub fn new(portal_ip: Ipv4Addr) -> Self {
        Self {
            portal_ip,
            running: Arc::new(AtomicBool::new(false)),
            listener: Mutex::new(None),
            bound: Mutex::new(None),
        }
    }

    /// True while the listener thread is alive.
    pub fn is_running(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start the listener on `bind`. Idempotent; a bind failure is logged
    /// and leaves the responder stopped (degraded operation, not a fault).
    pub fn start(&self, bind: SocketAddr) {
        let mut listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if listener.is_some() {
            warn!("DNS responder already running");
            return;
        }

        let socket = match UdpSocket::bind(bind) {
            Ok(socket) => socket,
            Err(e) => {
                error!("DNS responder failed to bind {}: {}", bind, e);
                return;
            }
        };
        if let Err(e) = socket.set_read_timeout(Some(SOCKET_POLL)) {
            error!("DNS responder failed to set receive timeout: {}", e);
            return;
        }
        let bound = socket.local_addr().ok();
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner) = bound;

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let portal_ip = self.portal_ip;
        let (done_tx, done_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            run_listener(socket, portal_ip, running);
            let _ = done_tx.send(());
        });

        info!("DNS responder started on {}", bind);
        *listener = Some(Listener { handle, done_rx });
    }

    /// Stop the listener and wait for it to exit. Returns immediately if
    /// already stopped. A listener that misses the stop deadline is logged
    /// and abandoned rather than blocked on forever.
    pub fn stop(&self) {
        let taken = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(listener) = taken else {
            debug!("DNS responder already stopped");
            return;
        };

        info!("Stopping DNS responder...");
        self.running.store(false, Ordering::Release);
        match listener.done_rx.recv_timeout(STOP_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = listener.handle.join();
                info!("DNS responder stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                error!(
                    "DNS responder did not stop within {:?}, abandoning thread",
                    STOP_TIMEOUT
                );
            }
        }
    }

    /// Local address of the bound socket, if running.
    ///
    /// Recorded at start; the socket itself lives on the listener thread.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        if !self.is_running() {
            return None;
        }
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DnsResponder {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_listener(socket: UdpSocket, portal_ip: Ipv4Addr, running: Arc<AtomicBool>) {
    let mut buf = [0u8; MAX_DATAGRAM];
    while running.load(Ordering::Acquire) {
        match socket.recv_from(&mut buf) {
            Ok((len, peer)) => {
                if let Some(response) = build_response(&buf[..len], portal_ip) {
                    if let Err(e) = socket.send_to(&response, peer) {
                        warn!("DNS responder failed to send to {}: {}", peer, e);
                    }
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                // Receive poll elapsed, re-check the stop flag.
            }
            Err(e) => {
                error!("DNS responder socket error: {}", e);
                break;
            }
        }
    }
}

/// Build the hijacked response for one query datagram.
///
/// Returns `None` for datagrams that should be silently dropped: shorter
/// than a DNS header, or with a truncated question section. Otherwise the
/// response echoes the transaction ID and question, reports one answer, and
/// appends a single A record whose RDATA is `portal_ip`, regardless of the
/// query's type or class.
pub fn build_response(query: &[u8], portal_ip: Ipv4Addr) -> Option<Vec<u8>> {
    if query.len() < DNS_HEADER_SIZE {
        return None;
    }

    // Question section runs from the header to the first zero-length label,
    // plus 4 bytes of type/class.
    let mut qend = DNS_HEADER_SIZE;
    while qend < query.len() && query[qend] != 0 {
        qend += 1;
    }
    if qend >= query.len() {
        return None;
    }
    qend += 1;
    if qend + 4 > query.len() {
        return None;
    }
    let question = &query[DNS_HEADER_SIZE..qend + 4];

    let mut response = Vec::with_capacity(DNS_HEADER_SIZE + question.len() + 16);
    response.extend_from_slice(&query[0..2]); // transaction ID
    response.extend_from_slice(&[0x81, 0x80]); // response, recursion available, no error
    response.extend_from_slice(&query[4..6]); // QDCOUNT echoed
    response.extend_from_slice(&[0x00, 0x01]); // ANCOUNT = 1
    response.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // NSCOUNT, ARCOUNT
    response.extend_from_slice(question);

    response.extend_from_slice(&[0xC0, 0x0C]); // name: pointer to question
    response.extend_from_slice(&[0x00, 0x01]); // TYPE A
    response.extend_from_slice(&[0x00, 0x01]); // CLASS IN
    response.extend_from_slice(&ANSWER_TTL.to_be_bytes());
    response.extend_from_slice(&[0x00, 0x04]); // RDLENGTH
    response.extend_from_slice(&portal_ip.octets());

    Some(response)
}
