//! Signature verification.
//!
//! HMAC schemes recompute the MAC over the raw body and compare it with the
//! header-supplied signature in constant time. Custom schemes delegate to a
//! [`SignatureVerifier`] registered in a [`VerifierCatalog`] under a name that
//! configuration files can refer to.

use crate::{
    descriptor::SignatureScheme, outcome::RejectionReason, request::HeaderList,
    secret::WebhookSecret,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;
use std::{collections::BTreeMap, fmt, sync::Arc};
use subtle::ConstantTimeEq;
use tracing::debug;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Name under which [`BearerTokenVerifier`] is pre-registered.
pub const BEARER_TOKEN_VERIFIER: &str = "bearer-token";

// ============================================================================
// SignatureVerifier
// ============================================================================

/// A signature check for receivers whose scheme is not plain HMAC.
///
/// Implementations must compare secrets and digests in constant time.
pub trait SignatureVerifier: Send + Sync {
    /// Return `true` when `signature` authenticates `payload` under `secret`.
    ///
    /// `signature` is the header value with any configured prefix removed.
    fn verify(&self, payload: &[u8], signature: &str, secret: &WebhookSecret) -> bool;
}

/// Header value must equal the secret (shared-token senders).
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerTokenVerifier;

impl SignatureVerifier for BearerTokenVerifier {
    fn verify(&self, _payload: &[u8], signature: &str, secret: &WebhookSecret) -> bool {
        let token = signature
            .strip_prefix("Bearer ")
            .unwrap_or(signature)
            .trim();
        token.as_bytes().ct_eq(secret.expose_bytes()).into()
    }
}

// ============================================================================
// VerifierCatalog
// ============================================================================

/// Named custom verifiers available to configuration.
///
/// [`VerifierCatalog::new`] includes [`BearerTokenVerifier`] as
/// `"bearer-token"`; use [`VerifierCatalog::empty`] to start from nothing.
#[derive(Clone)]
pub struct VerifierCatalog {
    verifiers: BTreeMap<String, Arc<dyn SignatureVerifier>>,
}

impl VerifierCatalog {
    pub fn new() -> Self {
        let mut catalog = Self::empty();
        catalog.register(BEARER_TOKEN_VERIFIER, Arc::new(BearerTokenVerifier));
        catalog
    }

    pub fn empty() -> Self {
        Self {
            verifiers: BTreeMap::new(),
        }
    }

    /// Add or replace a verifier. Returns `&mut Self` for chaining.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> &mut Self {
        self.verifiers.insert(name.into(), verifier);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SignatureVerifier>> {
        self.verifiers.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.verifiers.keys().map(String::as_str)
    }
}

impl Default for VerifierCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VerifierCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifierCatalog")
            .field("verifiers", &self.verifiers.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// HMAC helpers
// ============================================================================

/// HMAC digest used by a signing sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HmacAlgorithm {
    Sha1,
    Sha256,
}

/// The secret could not be used as a MAC key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("secret cannot be used as an HMAC key")]
pub struct InvalidSecretKey;

/// Compute the lowercase hex HMAC of `payload`, as a sender would.
///
/// # Examples
///
/// ```rust
/// use webhook_intake_core::{compute_signature, HmacAlgorithm};
///
/// let signature = compute_signature(HmacAlgorithm::Sha256, b"key", b"payload").unwrap();
/// assert_eq!(signature.len(), 64);
/// ```
pub fn compute_signature(
    algorithm: HmacAlgorithm,
    secret: &[u8],
    payload: &[u8],
) -> Result<String, InvalidSecretKey> {
    let digest = match algorithm {
        HmacAlgorithm::Sha1 => {
            let mut mac = HmacSha1::new_from_slice(secret).map_err(|_| InvalidSecretKey)?;
            mac.update(payload);
            mac.finalize().into_bytes().to_vec()
        }
        HmacAlgorithm::Sha256 => {
            let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| InvalidSecretKey)?;
            mac.update(payload);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(hex::encode(digest))
}

/// Constant-time check of a lowercase hex signature against the recomputed HMAC.
fn verify_hmac(algorithm: HmacAlgorithm, secret: &[u8], payload: &[u8], hex_sig: &str) -> bool {
    if hex_sig.bytes().any(|b| b.is_ascii_uppercase()) {
        return false;
    }
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };

    match algorithm {
        HmacAlgorithm::Sha1 => match HmacSha1::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(payload);
                mac.verify_slice(&expected).is_ok()
            }
            Err(_) => false,
        },
        HmacAlgorithm::Sha256 => match HmacSha256::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(payload);
                mac.verify_slice(&expected).is_ok()
            }
            Err(_) => false,
        },
    }
}

/// Verify the request signature required by `scheme`.
///
/// # Errors
///
/// - [`RejectionReason::SignatureMissing`] when the header is absent or blank
/// - [`RejectionReason::SignatureMismatch`] when the prefix is missing, the
///   encoding is invalid, or the digest does not match
pub(crate) fn check_signature(
    scheme: &SignatureScheme,
    headers: &HeaderList,
    payload: &[u8],
) -> Result<(), RejectionReason> {
    let Some(settings) = scheme.settings() else {
        return Ok(());
    };

    let raw = headers
        .get(settings.header_name())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(RejectionReason::SignatureMissing)?;

    let signature = match settings.prefix() {
        Some(prefix) => raw.strip_prefix(prefix).ok_or_else(|| {
            debug!(header = %settings.header_name(), "signature prefix missing");
            RejectionReason::SignatureMismatch
        })?,
        None => raw,
    };

    let secret = settings.secret().expose_bytes();
    let valid = match scheme {
        SignatureScheme::None => true,
        SignatureScheme::HmacSha1(_) => verify_hmac(HmacAlgorithm::Sha1, secret, payload, signature),
        SignatureScheme::HmacSha256(_) => {
            verify_hmac(HmacAlgorithm::Sha256, secret, payload, signature)
        }
        SignatureScheme::Custom(custom) => {
            custom
                .verifier()
                .verify(payload, signature, custom.settings().secret())
        }
    };

    if valid {
        Ok(())
    } else {
        Err(RejectionReason::SignatureMismatch)
    }
}

#[cfg(test)]
#[path = "verifier_tests.rs"]
mod tests;
