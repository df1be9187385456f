//! Captive portal HTTP server.
//!
//! Serves the static provisioning form on every GET path (captive-portal
//! detection fetches arbitrary URLs, all of which must land on the form) and
//! accepts exactly one state-changing submission: `POST /connect` with
//! form-encoded `ssid` and `pass` (or `password`) fields. A successful parse
//! hands the credentials to the orchestrator through the single-slot
//! credential channel.
//!
//! A small fixed pool of threads shares the `tiny_http` listener, each
//! polling with a bounded timeout so `stop()` can tear the pool down
//! synchronously.

use crate::channel::CredentialChannel;
use crate::config::{MAX_BODY_LEN, PORTAL_WORKERS, SOCKET_POLL, STOP_TIMEOUT};
use crate::credentials::Credentials;
use crate::mode::ModeTransitionRequest;
use log::{debug, error, info, warn};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tiny_http::{Header, Method, Request, Response, Server};

/// The provisioning form served on every GET path.
const FORM_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Device Setup</title>
<style>
body { font-family: sans-serif; margin: 2em auto; max-width: 22em; }
input { width: 100%; margin: 0.3em 0 1em; padding: 0.5em; box-sizing: border-box; }
button { width: 100%; padding: 0.6em; }
</style>
</head>
<body>
<h2>Connect your device</h2>
<form method="POST" action="/connect">
<label for="ssid">Network name</label>
<input id="ssid" name="ssid" maxlength="63" required>
<label for="pass">Password</label>
<input id="pass" name="pass" type="password" maxlength="63">
<button type="submit">Connect</button>
</form>
</body>
</html>
"#;

/// Confirmation page returned for every `POST /connect`, whether or not the
/// submitted fields were usable.
const CONFIRM_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Device Setup</title></head>
<body>
<h2>Connecting...</h2>
<p>The device is now trying to join the network. If it fails, this
setup network will come back and you can try again.</p>
</body>
</html>
"#;

struct Pool {
    server: Arc<Server>,
    handles: Vec<thread::JoinHandle<()>>,
    done_rx: mpsc::Receiver<()>,
    bound: Option<SocketAddr>,
}

/// The provisioning HTTP server.
pub struct CaptivePortal {
    channel: Arc<CredentialChannel>,
    running: Arc<AtomicBool>,
    pool: Mutex<Option<Pool>>,
}

impl CaptivePortal {
    /// Create a portal that submits credentials into `channel`.
    pub fn new(channel: Arc<CredentialChannel>) -> Self {
        Self {
            channel,
            running: Arc::new(AtomicBool::new(false)),
            pool: Mutex::new(None),
        }
    }

    /// True while the listener pool is alive.
    pub fn is_running(&self) -> bool {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start the listener on `bind`. Idempotent; a failure to bind is
    /// logged and leaves the portal stopped (degraded operation).
    pub fn start(&self, bind: SocketAddr) {
        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if pool.is_some() {
            warn!("captive portal already running");
            return;
        }

        let server = match Server::http(bind) {
            Ok(server) => Arc::new(server),
            Err(e) => {
                error!("captive portal failed to bind {}: {}", bind, e);
                return;
            }
        };
        let bound = server.server_addr().to_ip();

        self.running.store(true, Ordering::Release);
        let (done_tx, done_rx) = mpsc::channel();
        let mut handles = Vec::with_capacity(PORTAL_WORKERS);
        for _ in 0..PORTAL_WORKERS {
            let server = Arc::clone(&server);
            let running = Arc::clone(&self.running);
            let channel = Arc::clone(&self.channel);
            let done_tx = done_tx.clone();
            handles.push(thread::spawn(move || {
                run_worker(&server, &running, &channel);
                let _ = done_tx.send(());
            }));
        }

        info!("captive portal started on {}", bind);
        *pool = Some(Pool {
            server,
            handles,
            done_rx,
            bound,
        });
    }

    /// Stop the portal and block until the listener has released its
    /// resources. Returns immediately when already stopped.
    pub fn stop(&self) {
        let taken = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(pool) = taken else {
            debug!("captive portal already stopped");
            return;
        };

        info!("Stopping captive portal...");
        self.running.store(false, Ordering::Release);
        let mut exited = 0;
        for _ in 0..pool.handles.len() {
            match pool.done_rx.recv_timeout(STOP_TIMEOUT) {
                Ok(()) => exited += 1,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    error!(
                        "captive portal worker did not stop within {:?}",
                        STOP_TIMEOUT
                    );
                    break;
                }
            }
        }
        if exited == pool.handles.len() {
            for handle in pool.handles {
                let _ = handle.join();
            }
            // Last reference to the server drops here, closing the socket.
            drop(pool.server);
            info!("captive portal stopped");
        } else {
            error!("captive portal stopped with stuck workers, socket may linger");
        }
    }

    /// Local address of the bound listener, if running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|pool| pool.bound)
    }
}

impl Drop for CaptivePortal {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(server: &Server, running: &AtomicBool, channel: &CredentialChannel) {
    while running.load(Ordering::Acquire) {
        match server.recv_timeout(SOCKET_POLL) {
            Ok(Some(request)) => handle_request(request, channel),
            Ok(None) => {
                // Poll elapsed, re-check the stop flag.
            }
            Err(e) => {
                error!("captive portal accept error: {}", e);
                break;
            }
        }
    }
}

fn handle_request(mut request: Request, channel: &CredentialChannel) {
    let html = Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..]).expect("static header");

    match (request.method().clone(), request.url().to_string()) {
        (Method::Get, url) if url == "/favicon.ico" => {
            respond(request, Response::from_string("Not Found").with_status_code(404));
        }
        (Method::Get, _) => {
            // Every GET path is a captive-portal trap returning the form.
            respond(
                request,
                Response::from_string(FORM_HTML)
                    .with_status_code(200)
                    .with_header(html),
            );
        }
        (Method::Post, url) if url == "/connect" => {
            let declared = request.body_length();
            let body = match read_body(&mut request, declared) {
                Ok(body) => body,
                Err(reject) => {
                    respond(request, reject.into_response());
                    return;
                }
            };

            let (identity, secret) = extract_credentials(&body);
            let credentials = Credentials::from_form(identity, secret);
            info!("form submitted: ssid='{}'", credentials.identity);

            // Confirmation page goes out regardless of whether the fields
            // were usable; the orchestrator enforces the identity invariant.
            respond(
                request,
                Response::from_string(CONFIRM_HTML)
                    .with_status_code(200)
                    .with_header(html),
            );
            channel.try_send(ModeTransitionRequest::client(credentials));
        }
        (method, url) => {
            debug!("captive portal: unhandled {} {}", method, url);
            respond(request, Response::from_string("Not Found").with_status_code(404));
        }
    }
}

enum BodyReject {
    BadLength,
    ReadFailed,
}

impl BodyReject {
    fn into_response(self) -> Response<std::io::Cursor<Vec<u8>>> {
        match self {
            Self::BadLength => {
                Response::from_string("Invalid content length").with_status_code(400)
            }
            Self::ReadFailed => {
                Response::from_string("Internal Server Error").with_status_code(500)
            }
        }
    }
}

/// Read exactly the declared number of body bytes.
///
/// Oversized or absent lengths are rejected before any of the payload is
/// read; a short or failed read aborts with an internal error and no
/// mode-transition request is issued.
fn read_body(request: &mut Request, declared: Option<usize>) -> Result<Vec<u8>, BodyReject> {
    let len = match declared {
        Some(len) if len > 0 && len <= MAX_BODY_LEN => len,
        _ => {
            warn!("rejecting /connect body with length {:?}", declared);
            return Err(BodyReject::BadLength);
        }
    };

    let mut body = vec![0u8; len];
    if let Err(e) = request.as_reader().read_exact(&mut body) {
        error!("failed to read /connect body: {}", e);
        return Err(BodyReject::ReadFailed);
    }
    Ok(body)
}

/// Extract the `ssid` and `pass` (fallback `password`) fields from a
/// form-encoded body. Missing fields yield empty strings; decoding is
/// best-effort and never fails.
pub fn extract_credentials(body: &[u8]) -> (String, String) {
    let mut ssid = String::new();
    let mut pass = None;
    let mut password = None;

    for pair in body.split(|&b| b == b'&') {
        let mut parts = pair.splitn(2, |&b| b == b'=');
        let key = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or_default();
        match key {
            b"ssid" => ssid = form_decode(value),
            b"pass" => pass = Some(form_decode(value)),
            b"password" => password = Some(form_decode(value)),
            _ => {}
        }
    }

    (ssid, pass.or(password).unwrap_or_default())
}

/// Decode one `application/x-www-form-urlencoded` value: `+` becomes a
/// space and `%XX` the byte with hex value XX. Malformed escapes are kept
/// literally rather than rejected.
pub fn form_decode(value: &[u8]) -> String {
    let mut decoded = Vec::with_capacity(value.len());
    let mut i = 0;
    while i < value.len() {
        match value[i] {
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            b'%' => match hex_pair(value, i) {
                Some(byte) => {
                    decoded.push(byte);
                    i += 3;
                }
                None => {
                    decoded.push(b'%');
                    i += 1;
                }
            },
            other => {
                decoded.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_pair(value: &[u8], at: usize) -> Option<u8> {
    let high = value.get(at + 1).and_then(|b| (*b as char).to_digit(16))?;
    let low = value.get(at + 2).and_then(|b| (*b as char).to_digit(16))?;
    Some((high * 16 + low) as u8)
}

fn respond<R: Read>(request: Request, response: Response<R>) {
    if let Err(e) = request.respond(response) {
        warn!("captive portal failed to send response: {}", e);
    }
}
