//! Receiver configuration files.
//!
//! Receivers are declared in YAML or JSON and turned into a
//! [`ReceiverRegistry`] at startup:
//!
//! ```yaml
//! receivers:
//!   - name: pusher
//!     body_encoding: json
//!     signature:
//!       scheme: hmac_sha256
//!       header_name: X-Pusher-Signature
//!       secret:
//!         type: env
//!         variable: PUSHER_WEBHOOK_SECRET
//!     event:
//!       type: body_path
//!       path: events[0].name
//!   - name: legacy-ci
//!     body_encoding: form
//!     event:
//!       type: header
//!       name: X-CI-Event
//!     allow_missing_event: true
//! ```

use crate::{
    descriptor::{
        BodyEncoding, CustomScheme, EventSource, ReceiverDescriptor, SignatureScheme,
        SignatureSettings,
    },
    registry::ReceiverRegistry,
    secret::WebhookSecret,
    verifier::VerifierCatalog,
    ConfigurationError, ReceiverName,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Environment variable holding a JSON receivers document.
pub const RECEIVERS_ENV_VAR: &str = "WEBHOOK_RECEIVERS";

// ============================================================================
// SecretSource
// ============================================================================

/// Where a signing secret comes from.
///
/// # Security
///
/// [`SecretSource::Literal`] is for development and testing only. A `WARN`
/// is logged whenever a literal secret is resolved.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SecretSource {
    /// Read from an environment variable when the registry is built.
    Env { variable: String },

    /// Embedded in the configuration. Excluded from `Debug` output.
    Literal { value: String },
}

impl SecretSource {
    /// Resolve the secret for `receiver`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::SecretUnavailable`] when the environment
    /// variable is unset, not valid UTF-8, or empty.
    pub fn resolve(&self, receiver: &str) -> Result<WebhookSecret, ConfigurationError> {
        match self {
            Self::Literal { value } => {
                warn!(
                    receiver = %receiver,
                    "receiver uses a literal webhook secret; use an env secret outside development"
                );
                Ok(WebhookSecret::from_string(value.clone()))
            }
            Self::Env { variable } => {
                let value = std::env::var(variable).map_err(|e| {
                    ConfigurationError::SecretUnavailable {
                        name: receiver.to_string(),
                        message: format!("environment variable '{}': {}", variable, e),
                    }
                })?;
                if value.is_empty() {
                    return Err(ConfigurationError::SecretUnavailable {
                        name: receiver.to_string(),
                        message: format!("environment variable '{}' is empty", variable),
                    });
                }
                Ok(WebhookSecret::from_string(value))
            }
        }
    }
}

impl std::fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env { variable } => f
                .debug_struct("SecretSource::Env")
                .field("variable", variable)
                .finish(),
            Self::Literal { .. } => f
                .debug_struct("SecretSource::Literal")
                .field("value", &"<REDACTED>")
                .finish(),
        }
    }
}

// ============================================================================
// Signature and event source records
// ============================================================================

/// Signature scheme names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeKind {
    HmacSha1,
    HmacSha256,
    Custom,
}

/// Signature requirements for one receiver.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignatureConfig {
    pub scheme: SchemeKind,

    /// Header carrying the signature, e.g. `X-Hub-Signature-256`.
    pub header_name: String,

    /// Literal prefix to require and strip, e.g. `sha256=`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    pub secret: SecretSource,

    /// Name of a [`VerifierCatalog`] entry. Required for `custom`, rejected
    /// for the HMAC schemes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
}

impl SignatureConfig {
    fn to_scheme(
        &self,
        receiver: &str,
        catalog: &VerifierCatalog,
    ) -> Result<SignatureScheme, ConfigurationError> {
        let mut settings =
            SignatureSettings::new(self.header_name.clone(), self.secret.resolve(receiver)?);
        if let Some(prefix) = &self.prefix {
            settings = settings.with_prefix(prefix.clone());
        }

        let invalid = |message: &str| ConfigurationError::InvalidSignature {
            name: receiver.to_string(),
            message: message.to_string(),
        };

        match (self.scheme, &self.verifier) {
            (SchemeKind::HmacSha1, None) => Ok(SignatureScheme::HmacSha1(settings)),
            (SchemeKind::HmacSha256, None) => Ok(SignatureScheme::HmacSha256(settings)),
            (SchemeKind::HmacSha1 | SchemeKind::HmacSha256, Some(_)) => {
                Err(invalid("'verifier' is only valid with the custom scheme"))
            }
            (SchemeKind::Custom, None) => Err(invalid("custom scheme requires a 'verifier'")),
            (SchemeKind::Custom, Some(name)) => {
                let verifier =
                    catalog
                        .get(name)
                        .ok_or_else(|| ConfigurationError::UnknownVerifier {
                            name: receiver.to_string(),
                            verifier: name.clone(),
                        })?;
                Ok(SignatureScheme::Custom(CustomScheme::new(
                    name.clone(),
                    verifier,
                    settings,
                )))
            }
        }
    }
}

/// Where the event name is read from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EventSourceConfig {
    Header { name: String },
    BodyPath { path: String },
    Constant { value: String },
}

impl EventSourceConfig {
    fn to_event_source(&self) -> Result<EventSource, ConfigurationError> {
        match self {
            Self::Header { name } => Ok(EventSource::header(name.clone())),
            Self::BodyPath { path } => EventSource::body_path(path),
            Self::Constant { value } => Ok(EventSource::constant(value.clone())),
        }
    }
}

// ============================================================================
// ReceiverConfig
// ============================================================================

/// One receiver record.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReceiverConfig {
    pub name: String,

    pub body_encoding: BodyEncoding,

    /// Omit for unsigned receivers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureConfig>,

    pub event: EventSourceConfig,

    #[serde(default)]
    pub allow_missing_event: bool,
}

impl ReceiverConfig {
    /// Build the descriptor, resolving secrets and custom verifiers.
    ///
    /// The descriptor is not validated here; [`ReceiverRegistry::register`]
    /// does that.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::InvalidReceiverName`] for a bad name
    /// - [`ConfigurationError::InvalidPropertyPath`] for a bad body path
    /// - [`ConfigurationError::SecretUnavailable`] when a secret cannot be read
    /// - [`ConfigurationError::UnknownVerifier`] when a custom verifier is not
    ///   in `catalog`
    /// - [`ConfigurationError::InvalidSignature`] when `verifier` is used
    ///   with the wrong scheme
    pub fn to_descriptor(
        &self,
        catalog: &VerifierCatalog,
    ) -> Result<ReceiverDescriptor, ConfigurationError> {
        let name = ReceiverName::new(self.name.clone())?;
        let event_source = self.event.to_event_source()?;

        let mut descriptor = ReceiverDescriptor::new(name, self.body_encoding, event_source)
            .allow_missing_event(self.allow_missing_event);

        if let Some(signature) = &self.signature {
            descriptor = descriptor.with_signature(signature.to_scheme(&self.name, catalog)?);
        }

        Ok(descriptor)
    }
}

// ============================================================================
// ReceiversConfig
// ============================================================================

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReceiversConfig {
    #[serde(default)]
    pub receivers: Vec<ReceiverConfig>,
}

impl ReceiversConfig {
    /// Load configuration from a file.
    ///
    /// `.yaml`/`.yml` files are parsed as YAML and `.json` as JSON; anything
    /// else is tried as JSON, then YAML.
    ///
    /// # Errors
    /// - `ConfigurationError::FileNotFound` - Configuration file missing
    /// - `ConfigurationError::Parse` - Unreadable file or invalid syntax
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigurationError> {
        if !path.exists() {
            return Err(ConfigurationError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Parse {
            message: format!("Failed to read file: {}", e),
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match extension.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&contents),
            "json" => Self::from_json_str(&contents),
            _ => serde_json::from_str(&contents)
                .or_else(|_| serde_yaml::from_str(&contents))
                .map_err(|e| ConfigurationError::Parse {
                    message: format!("Failed to parse as JSON or YAML: {}", e),
                }),
        }
    }

    /// Load configuration from the `WEBHOOK_RECEIVERS` environment variable (JSON).
    pub fn load_from_env() -> Result<Self, ConfigurationError> {
        Self::load_from_env_var(RECEIVERS_ENV_VAR)
    }

    /// Load configuration from a JSON document in the named environment variable.
    pub fn load_from_env_var(variable: &str) -> Result<Self, ConfigurationError> {
        let contents = std::env::var(variable).map_err(|_| {
            ConfigurationError::SourceUnavailable(format!(
                "{} environment variable not set",
                variable
            ))
        })?;

        serde_json::from_str(&contents).map_err(|e| ConfigurationError::Parse {
            message: format!("Invalid JSON in {}: {}", variable, e),
        })
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigurationError> {
        serde_yaml::from_str(contents).map_err(|e| ConfigurationError::Parse {
            message: format!("Invalid YAML: {}", e),
        })
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(contents).map_err(|e| ConfigurationError::Parse {
            message: format!("Invalid JSON: {}", e),
        })
    }

    /// Resolve every receiver and register it.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`ReceiverConfig::to_descriptor`] or
    /// [`ReceiverRegistry::register`].
    pub fn build_registry(
        &self,
        catalog: &VerifierCatalog,
    ) -> Result<ReceiverRegistry, ConfigurationError> {
        let descriptors = self
            .receivers
            .iter()
            .map(|receiver| receiver.to_descriptor(catalog))
            .collect::<Result<Vec<_>, _>>()?;

        ReceiverRegistry::from_descriptors(descriptors)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
