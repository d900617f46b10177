//! Receiver descriptors.
//!
//! A [`ReceiverDescriptor`] is the static contract for one webhook source:
//! which body encoding it sends, how its requests are signed, and where the
//! event name lives. Descriptors are built at startup, validated once when
//! registered, and never mutated afterwards.

use crate::{
    path::{PathSegment, PropertyPath},
    secret::WebhookSecret,
    verifier::SignatureVerifier,
    ConfigurationError, ReceiverName,
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

// ============================================================================
// BodyEncoding
// ============================================================================

/// Body encoding a receiver requires.
///
/// | Variant | Accepted media types                                 |
/// |---------|------------------------------------------------------|
/// | `Form`  | `application/x-www-form-urlencoded`                  |
/// | `Json`  | `application/json`, `text/json`, `*/*+json`          |
/// | `Xml`   | `application/xml`, `text/xml`, `*/*+xml`             |
/// | `Raw`   | anything, including a missing content type           |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyEncoding {
    Form,
    Json,
    Xml,
    Raw,
}

impl BodyEncoding {
    /// Whether an event can be read from a body of this encoding.
    pub fn supports_body_path(&self) -> bool {
        !matches!(self, Self::Raw)
    }

    /// Whether `media_type` (lowercase, parameters stripped) matches this encoding.
    pub fn accepts_media_type(&self, media_type: Option<&str>) -> bool {
        match self {
            Self::Raw => true,
            Self::Form => media_type == Some("application/x-www-form-urlencoded"),
            Self::Json => media_type.is_some_and(|mt| {
                mt == "application/json" || mt == "text/json" || has_suffix(mt, "+json")
            }),
            Self::Xml => media_type.is_some_and(|mt| {
                mt == "application/xml" || mt == "text/xml" || has_suffix(mt, "+xml")
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Raw => "raw",
        }
    }
}

fn has_suffix(media_type: &str, suffix: &str) -> bool {
    media_type
        .split_once('/')
        .is_some_and(|(kind, subtype)| {
            !kind.is_empty() && subtype.len() > suffix.len() && subtype.ends_with(suffix)
        })
}

impl fmt::Display for BodyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Signature schemes
// ============================================================================

/// Where a signature is carried and which secret verifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSettings {
    header_name: String,
    prefix: Option<String>,
    secret: WebhookSecret,
}

impl SignatureSettings {
    /// Signature read from `header_name`, verified with `secret`.
    pub fn new(header_name: impl Into<String>, secret: WebhookSecret) -> Self {
        Self {
            header_name: header_name.into(),
            prefix: None,
            secret,
        }
    }

    /// Require and strip a literal prefix such as `sha256=`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn secret(&self) -> &WebhookSecret {
        &self.secret
    }

    fn validate(&self, receiver: &ReceiverName) -> Result<(), ConfigurationError> {
        let invalid = |message: &str| ConfigurationError::InvalidSignature {
            name: receiver.to_string(),
            message: message.to_string(),
        };

        if self.header_name.trim().is_empty() {
            return Err(invalid("signature header name must not be empty"));
        }
        if self.prefix.as_deref().is_some_and(str::is_empty) {
            return Err(invalid("signature prefix must not be empty when set"));
        }
        if self.secret.is_empty() {
            return Err(invalid("signing secret must not be empty"));
        }
        Ok(())
    }
}

/// A named, caller-supplied signature check.
#[derive(Clone)]
pub struct CustomScheme {
    name: String,
    verifier: Arc<dyn SignatureVerifier>,
    settings: SignatureSettings,
}

impl CustomScheme {
    pub fn new(
        name: impl Into<String>,
        verifier: Arc<dyn SignatureVerifier>,
        settings: SignatureSettings,
    ) -> Self {
        Self {
            name: name.into(),
            verifier,
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verifier(&self) -> &dyn SignatureVerifier {
        self.verifier.as_ref()
    }

    pub fn settings(&self) -> &SignatureSettings {
        &self.settings
    }
}

impl PartialEq for CustomScheme {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && Arc::ptr_eq(&self.verifier, &other.verifier)
            && self.settings == other.settings
    }
}

impl Eq for CustomScheme {}

impl fmt::Debug for CustomScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomScheme")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// How a receiver's requests are signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureScheme {
    /// Requests are not signed.
    None,
    /// Hex-encoded HMAC-SHA1 over the raw body (legacy senders).
    HmacSha1(SignatureSettings),
    /// Hex-encoded HMAC-SHA256 over the raw body.
    HmacSha256(SignatureSettings),
    /// Delegates to a [`SignatureVerifier`].
    Custom(CustomScheme),
}

impl SignatureScheme {
    /// Header, prefix and secret, unless the scheme is [`SignatureScheme::None`].
    pub fn settings(&self) -> Option<&SignatureSettings> {
        match self {
            Self::None => None,
            Self::HmacSha1(settings) | Self::HmacSha256(settings) => Some(settings),
            Self::Custom(custom) => Some(custom.settings()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::None => "none",
            Self::HmacSha1(_) => "hmac_sha1",
            Self::HmacSha256(_) => "hmac_sha256",
            Self::Custom(custom) => custom.name(),
        }
    }
}

// ============================================================================
// EventSource
// ============================================================================

/// Where the event name is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    /// First value of a request header.
    Header { name: String },
    /// A property path into the parsed body.
    BodyPath { path: PropertyPath },
    /// Always the same event name.
    Constant { value: String },
}

impl EventSource {
    pub fn header(name: impl Into<String>) -> Self {
        Self::Header { name: name.into() }
    }

    /// Parse `path` into a body-path source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPropertyPath`] on a syntax error.
    pub fn body_path(path: &str) -> Result<Self, ConfigurationError> {
        let parsed = PropertyPath::parse(path).map_err(|source| {
            ConfigurationError::InvalidPropertyPath {
                path: path.to_string(),
                source,
            }
        })?;
        Ok(Self::BodyPath { path: parsed })
    }

    pub fn constant(value: impl Into<String>) -> Self {
        Self::Constant {
            value: value.into(),
        }
    }
}

// ============================================================================
// ReceiverDescriptor
// ============================================================================

/// Immutable verification rules for one receiver.
///
/// # Examples
///
/// ```rust
/// use webhook_intake_core::{
///     BodyEncoding, EventSource, ReceiverDescriptor, ReceiverName, SignatureScheme,
///     SignatureSettings, WebhookSecret,
/// };
///
/// let descriptor = ReceiverDescriptor::new(
///     ReceiverName::new("pusher").unwrap(),
///     BodyEncoding::Json,
///     EventSource::body_path("events[0].name").unwrap(),
/// )
/// .with_signature(SignatureScheme::HmacSha256(SignatureSettings::new(
///     "X-Pusher-Signature",
///     WebhookSecret::from_string("s3cret".to_string()),
/// )))
/// .allow_missing_event(true);
///
/// assert!(descriptor.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverDescriptor {
    name: ReceiverName,
    body_encoding: BodyEncoding,
    signature: SignatureScheme,
    event_source: EventSource,
    allow_missing_event: bool,
}

impl ReceiverDescriptor {
    /// Unsigned descriptor that requires an event.
    pub fn new(name: ReceiverName, body_encoding: BodyEncoding, event_source: EventSource) -> Self {
        Self {
            name,
            body_encoding,
            signature: SignatureScheme::None,
            event_source,
            allow_missing_event: false,
        }
    }

    pub fn with_signature(mut self, signature: SignatureScheme) -> Self {
        self.signature = signature;
        self
    }

    /// When set, a missing event resolves to [`crate::UNSPECIFIED_EVENT`]
    /// instead of rejecting the request.
    pub fn allow_missing_event(mut self, allow: bool) -> Self {
        self.allow_missing_event = allow;
        self
    }

    pub fn name(&self) -> &ReceiverName {
        &self.name
    }

    pub fn body_encoding(&self) -> BodyEncoding {
        self.body_encoding
    }

    pub fn signature(&self) -> &SignatureScheme {
        &self.signature
    }

    pub fn event_source(&self) -> &EventSource {
        &self.event_source
    }

    pub fn allows_missing_event(&self) -> bool {
        self.allow_missing_event
    }

    /// Check the descriptor for internal consistency.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::InconsistentEventSource`] when a body path is
    ///   used with an encoding that cannot address it (raw bodies, or form
    ///   paths deeper than `key[index]`, or XML paths not starting at the root
    ///   element)
    /// - [`ConfigurationError::InvalidEventSource`] for an empty header name
    ///   or constant
    /// - [`ConfigurationError::InvalidSignature`] for an empty signature
    ///   header, prefix or secret
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.validate_event_source()?;
        if let Some(settings) = self.signature.settings() {
            settings.validate(&self.name)?;
        }
        if let SignatureScheme::Custom(custom) = &self.signature {
            if custom.name().trim().is_empty() {
                return Err(ConfigurationError::InvalidSignature {
                    name: self.name.to_string(),
                    message: "custom scheme name must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_event_source(&self) -> Result<(), ConfigurationError> {
        let invalid = |message: &str| ConfigurationError::InvalidEventSource {
            name: self.name.to_string(),
            message: message.to_string(),
        };
        let inconsistent = |message: &str| ConfigurationError::InconsistentEventSource {
            name: self.name.to_string(),
            encoding: self.body_encoding,
            message: message.to_string(),
        };

        match &self.event_source {
            EventSource::Header { name } if name.trim().is_empty() => {
                Err(invalid("event header name must not be empty"))
            }
            EventSource::Constant { value } if value.trim().is_empty() => {
                Err(invalid("constant event name must not be empty"))
            }
            EventSource::Header { .. } | EventSource::Constant { .. } => Ok(()),
            EventSource::BodyPath { path } => {
                if !self.body_encoding.supports_body_path() {
                    return Err(inconsistent("raw bodies cannot be addressed by a property path"));
                }
                match self.body_encoding {
                    BodyEncoding::Form => validate_form_path(path).map_err(inconsistent),
                    BodyEncoding::Xml => validate_xml_path(path).map_err(inconsistent),
                    BodyEncoding::Json | BodyEncoding::Raw => Ok(()),
                }
            }
        }
    }
}

fn validate_form_path(path: &PropertyPath) -> Result<(), &'static str> {
    match path.segments() {
        [PathSegment::Key(_)] | [PathSegment::Key(_), PathSegment::Index(_)] => Ok(()),
        _ => Err("form paths must be a field name, optionally followed by one index"),
    }
}

fn validate_xml_path(path: &PropertyPath) -> Result<(), &'static str> {
    let segments = path.segments();
    if !matches!(segments.first(), Some(PathSegment::Key(root)) if !root.starts_with('@')) {
        return Err("XML paths must start with the root element name");
    }
    for (i, segment) in segments.iter().enumerate() {
        if let PathSegment::Key(key) = segment {
            if key.starts_with('@') && i + 1 != segments.len() {
                return Err("an XML attribute must be the last path segment");
            }
            if key == "@" {
                return Err("an XML attribute segment must name the attribute");
            }
        }
        if i > 0 && matches!((segment, &segments[i - 1]), (PathSegment::Index(_), PathSegment::Index(_))) {
            return Err("an XML index must follow an element name");
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
