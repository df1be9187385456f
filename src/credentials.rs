//! Target-network credentials.
//!
//! A credential pair is the identity (SSID) of the network the device should
//! join and its secret (passphrase). Both fields are bounded to what the
//! WiFi driver accepts; the secret is wiped from memory on drop.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum byte length of the identity and of the secret.
pub const MAX_FIELD_LEN: usize = 63;

/// Credentials for joining an existing network.
///
/// Two construction paths with different overflow behavior:
/// - [`Credentials::new`] rejects out-of-bounds input with a typed error;
/// - [`Credentials::from_form`] truncates, for values arriving from the
///   provisioning form where a best-effort result is wanted.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    /// Network SSID. Non-empty, at most [`MAX_FIELD_LEN`] bytes.
    pub identity: String,
    /// Network passphrase. At most [`MAX_FIELD_LEN`] bytes; may be empty
    /// for open networks.
    pub secret: String,
}

impl Credentials {
    /// Create validated credentials.
    pub fn new(
        identity: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let identity = identity.into();
        let secret = secret.into();

        if identity.is_empty() {
            return Err(CredentialsError::EmptyIdentity);
        }
        if identity.len() > MAX_FIELD_LEN {
            return Err(CredentialsError::IdentityTooLong {
                len: identity.len(),
                max: MAX_FIELD_LEN,
            });
        }
        if secret.len() > MAX_FIELD_LEN {
            return Err(CredentialsError::SecretTooLong {
                len: secret.len(),
                max: MAX_FIELD_LEN,
            });
        }

        Ok(Self { identity, secret })
    }

    /// Create credentials from form input, truncating oversized fields to
    /// the bound. The identity may come out empty; callers that require a
    /// usable identity must check for that.
    pub fn from_form(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: truncate_to_bound(identity.into(), MAX_FIELD_LEN),
            secret: truncate_to_bound(secret.into(), MAX_FIELD_LEN),
        }
    }

    /// True when the identity is usable for a client-mode transition.
    pub fn has_identity(&self) -> bool {
        !self.identity.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Truncate a string to `max` bytes without splitting a UTF-8 sequence.
fn truncate_to_bound(mut value: String, max: usize) -> String {
    if value.len() > max {
        let mut end = max;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        value.truncate(end);
    }
    value
}

/// Errors from validated credential construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    /// Identity is empty.
    EmptyIdentity,
    /// Identity exceeds the field bound.
    IdentityTooLong { len: usize, max: usize },
    /// Secret exceeds the field bound.
    SecretTooLong { len: usize, max: usize },
}

impl fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyIdentity => write!(f, "identity cannot be empty"),
            Self::IdentityTooLong { len, max } => {
                write!(f, "identity too long: {} bytes (max {})", len, max)
            }
            Self::SecretTooLong { len, max } => {
                write!(f, "secret too long: {} bytes (max {})", len, max)
            }
        }
    }
}

impl std::error::Error for CredentialsError {}
