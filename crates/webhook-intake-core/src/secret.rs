//! Secure container for per-receiver signing secrets.

use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Shared secret used to sign a receiver's webhooks.
///
/// The bytes are wiped from memory when the last copy is dropped and are
/// never included in `Debug` output or logs.
#[derive(Clone)]
pub struct WebhookSecret {
    inner: Zeroizing<Vec<u8>>,
}

impl WebhookSecret {
    /// Create a secret from raw bytes.
    pub fn from_bytes(value: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Zeroizing::new(value.into()),
        }
    }

    /// Create a secret from a string, taking ownership of its buffer.
    pub fn from_string(value: String) -> Self {
        Self::from_bytes(value.into_bytes())
    }

    /// Secret bytes, for immediate use as a MAC key only.
    pub fn expose_bytes(&self) -> &[u8] {
        &self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Length without exposing content.
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl PartialEq for WebhookSecret {
    fn eq(&self, other: &Self) -> bool {
        self.inner.as_slice().ct_eq(other.inner.as_slice()).into()
    }
}

impl Eq for WebhookSecret {}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookSecret")
            .field("length", &self.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}
