//! # Webhook-Intake Core
//!
//! Receiver-side verification and dispatch for inbound webhooks.
//!
//! A request for a named receiver runs through a linear pipeline:
//!
//! 1. [`ReceiverRegistry::lookup`] finds the receiver's [`ReceiverDescriptor`].
//! 2. [`body::verify`] checks the content type, the signature and the body shape.
//! 3. [`event::extract_event`] derives the event name from a header, a body
//!    path or a constant.
//! 4. The result is a [`VerificationOutcome`]: accepted with an event name and
//!    parsed body, or rejected with exactly one [`RejectionReason`].
//!
//! Every stage is a pure function over its inputs. The registry is built once
//! at startup and read concurrently afterwards without locking.
//!
//! ## Usage
//!
//! ```rust
//! use bytes::Bytes;
//! use webhook_intake_core::{
//!     BodyEncoding, Dispatcher, EventSource, HeaderList, IncomingRequest, ReceiverDescriptor,
//!     ReceiverName, ReceiverRegistry,
//! };
//!
//! let descriptor = ReceiverDescriptor::new(
//!     ReceiverName::new("pusher").unwrap(),
//!     BodyEncoding::Json,
//!     EventSource::body_path("event.type").unwrap(),
//! );
//!
//! let mut registry = ReceiverRegistry::new();
//! registry.register(descriptor).unwrap();
//!
//! let mut headers = HeaderList::new();
//! headers.append("Content-Type", "application/json");
//! let request = IncomingRequest::new(headers, Bytes::from_static(br#"{"event":{"type":"push"}}"#));
//!
//! let outcome = Dispatcher::new(&registry).dispatch("pusher", &request);
//! assert_eq!(outcome.event(), Some("push"));
//! ```

use std::fmt;
use std::str::FromStr;

pub mod body;
pub mod config;
pub mod descriptor;
pub mod event;
pub mod outcome;
pub mod path;
pub mod pipeline;
pub mod registry;
pub mod request;
pub mod secret;
pub mod verifier;

pub use body::{FormData, ParsedBody, XmlElement};
pub use config::{ReceiverConfig, ReceiversConfig};
pub use descriptor::{
    BodyEncoding, CustomScheme, EventSource, ReceiverDescriptor, SignatureScheme,
    SignatureSettings,
};
pub use event::UNSPECIFIED_EVENT;
pub use outcome::{RejectionReason, VerificationOutcome};
pub use path::{PathError, PathSegment, PropertyPath};
pub use pipeline::{Dispatcher, PipelineStage};
pub use registry::ReceiverRegistry;
pub use request::{HeaderList, IncomingRequest};
pub use secret::WebhookSecret;
pub use verifier::{
    compute_signature, BearerTokenVerifier, HmacAlgorithm, SignatureVerifier, VerifierCatalog,
};

// ============================================================================
// ReceiverName
// ============================================================================

/// URL-safe identifier for a webhook receiver.
///
/// A receiver name must consist entirely of lowercase ASCII letters, digits,
/// hyphens (`-`), or underscores (`_`). It must not be empty.
///
/// # Examples
///
/// ```rust
/// use webhook_intake_core::ReceiverName;
///
/// let name = ReceiverName::new("pusher").unwrap();
/// assert_eq!(name.as_str(), "pusher");
///
/// assert!(ReceiverName::new("Pusher").is_err()); // uppercase not allowed
/// assert!(ReceiverName::new("").is_err());       // empty not allowed
/// assert!(ReceiverName::new("../escape").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReceiverName(String);

impl ReceiverName {
    /// Create a new `ReceiverName`, validating it contains only URL-safe characters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidReceiverName`] if the value is
    /// empty or contains characters outside `[a-z0-9\-_]`.
    pub fn new(value: impl Into<String>) -> Result<Self, ConfigurationError> {
        let s = value.into();
        if s.is_empty() {
            return Err(ConfigurationError::InvalidReceiverName {
                name: s,
                message: "receiver name must not be empty".to_string(),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(ConfigurationError::InvalidReceiverName {
                message: "use lowercase alphanumeric, hyphens, or underscores".to_string(),
                name: s,
            });
        }
        Ok(Self(s))
    }

    /// Return the receiver name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiverName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ReceiverName {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ReceiverName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Registration-time and configuration-load failures.
///
/// These are fatal to startup: a process should refuse to serve webhooks
/// when any receiver fails to register.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("invalid receiver name '{name}': {message}")]
    InvalidReceiverName { name: String, message: String },

    #[error("receiver '{name}' is already registered")]
    DuplicateReceiver { name: String },

    #[error("receiver '{name}': event source is inconsistent with {encoding} body encoding: {message}")]
    InconsistentEventSource {
        name: String,
        encoding: descriptor::BodyEncoding,
        message: String,
    },

    #[error("receiver '{name}': invalid event source: {message}")]
    InvalidEventSource { name: String, message: String },

    #[error("invalid property path '{path}': {source}")]
    InvalidPropertyPath {
        path: String,
        #[source]
        source: PathError,
    },

    #[error("receiver '{name}': invalid signature configuration: {message}")]
    InvalidSignature { name: String, message: String },

    #[error("receiver '{name}': unknown signature verifier '{verifier}'")]
    UnknownVerifier { name: String, verifier: String },

    #[error("receiver '{name}': secret unavailable: {message}")]
    SecretUnavailable { name: String, message: String },

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to parse configuration: {message}")]
    Parse { message: String },

    #[error("configuration source unavailable: {0}")]
    SourceUnavailable(String),
}

/// Returned by [`ReceiverRegistry::lookup`] when no receiver has the given name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown receiver: {name}")]
pub struct UnknownReceiver {
    pub name: String,
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
