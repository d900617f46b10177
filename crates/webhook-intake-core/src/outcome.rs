//! Dispatch results.

use crate::{body::ParsedBody, UnknownReceiver};
use serde::{Deserialize, Serialize};

/// Why a request was rejected. Exactly one reason is reported per request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error,
)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("no receiver is registered under this name")]
    UnknownReceiver,

    #[error("content type does not match the receiver's body encoding")]
    UnsupportedContentType,

    #[error("body does not match the receiver's body encoding")]
    MalformedBody,

    #[error("signature header is missing")]
    SignatureMissing,

    #[error("signature does not match the request body")]
    SignatureMismatch,

    #[error("event name could not be determined")]
    EventMissing,
}

impl RejectionReason {
    /// HTTP status a host would typically answer with.
    ///
    /// Senders usually retry on any non-2xx response; retries are their
    /// responsibility, not the receiver's.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnknownReceiver => 404,
            Self::UnsupportedContentType => 415,
            Self::MalformedBody | Self::EventMissing => 400,
            Self::SignatureMissing | Self::SignatureMismatch => 401,
        }
    }

    /// Authentication failures, as opposed to shape or routing failures.
    pub fn is_security_failure(&self) -> bool {
        matches!(self, Self::SignatureMissing | Self::SignatureMismatch)
    }

    /// Stable snake_case identifier for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownReceiver => "unknown_receiver",
            Self::UnsupportedContentType => "unsupported_content_type",
            Self::MalformedBody => "malformed_body",
            Self::SignatureMissing => "signature_missing",
            Self::SignatureMismatch => "signature_mismatch",
            Self::EventMissing => "event_missing",
        }
    }
}

impl From<UnknownReceiver> for RejectionReason {
    fn from(_: UnknownReceiver) -> Self {
        Self::UnknownReceiver
    }
}

/// Terminal result of running one request through the pipeline.
///
/// Equality is structural.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Accepted { event: String, body: ParsedBody },
    Rejected(RejectionReason),
}

impl VerificationOutcome {
    pub fn accepted(event: impl Into<String>, body: ParsedBody) -> Self {
        Self::Accepted {
            event: event.into(),
            body,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn event(&self) -> Option<&str> {
        match self {
            Self::Accepted { event, .. } => Some(event),
            Self::Rejected(_) => None,
        }
    }

    pub fn body(&self) -> Option<&ParsedBody> {
        match self {
            Self::Accepted { body, .. } => Some(body),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<RejectionReason> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}

impl From<Result<(String, ParsedBody), RejectionReason>> for VerificationOutcome {
    fn from(result: Result<(String, ParsedBody), RejectionReason>) -> Self {
        match result {
            Ok((event, body)) => Self::Accepted { event, body },
            Err(reason) => Self::Rejected(reason),
        }
    }
}
