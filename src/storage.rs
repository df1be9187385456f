//! Persistent credential storage.
//!
//! The orchestrator reads the stored network identity once at boot and
//! writes it once per confirmed client-mode connection. The store itself is
//! an external collaborator behind a narrow key-value trait; any failure is
//! treated as "credential unavailable" and never blocks a mode transition.

use crate::credentials::Credentials;
use log::{debug, info, warn};
use std::fmt;

/// Store key for the target network's identity (SSID).
pub const KEY_IDENTITY: &str = "identity";

/// Store key for the target network's secret.
pub const KEY_SECRET: &str = "secret";

/// Errors surfaced by a credential store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key has never been written.
    NotFound,
    /// The underlying storage failed.
    Io(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Io(msg) => write!(f, "storage I/O error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Namespaced string key-value store holding the persisted identity.
pub trait CredentialStore: Send + 'static {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<String, StoreError>;

    /// Write `value` under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Load the persisted credentials, if any.
///
/// Absence of either key, a read failure, or an empty identity all mean
/// "no stored network to join" and yield `None`.
pub fn load_credentials<S: CredentialStore + ?Sized>(store: &S) -> Option<Credentials> {
    let identity = match store.get(KEY_IDENTITY) {
        Ok(identity) => identity,
        Err(StoreError::NotFound) => {
            debug!("no stored identity");
            return None;
        }
        Err(e) => {
            warn!("failed to read stored identity: {}", e);
            return None;
        }
    };
    let secret = match store.get(KEY_SECRET) {
        Ok(secret) => secret,
        Err(StoreError::NotFound) => {
            debug!("no stored secret");
            return None;
        }
        Err(e) => {
            warn!("failed to read stored secret: {}", e);
            return None;
        }
    };

    if identity.is_empty() {
        debug!("stored identity is empty, treating as unprovisioned");
        return None;
    }

    match Credentials::new(identity, secret) {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            warn!("stored credentials are invalid: {}", e);
            None
        }
    }
}

/// Persist both credential fields. Called only after a confirmed
/// successful client-mode connection.
pub fn save_credentials<S: CredentialStore + ?Sized>(
    store: &mut S,
    credentials: &Credentials,
) -> Result<(), StoreError> {
    store.set(KEY_IDENTITY, &credentials.identity)?;
    store.set(KEY_SECRET, &credentials.secret)?;
    info!("credentials saved for '{}'", credentials.identity);
    Ok(())
}
