//! Event name extraction.

use crate::{
    body::ParsedBody,
    descriptor::{EventSource, ReceiverDescriptor},
    outcome::RejectionReason,
    path::PropertyPath,
    request::HeaderList,
};
use serde_json::Value;
use tracing::debug;

/// Event name used when none can be found and the receiver allows it.
pub const UNSPECIFIED_EVENT: &str = "unspecified";

/// Derive the event name for a verified request.
///
/// # Errors
///
/// Returns [`RejectionReason::EventMissing`] when the configured source
/// yields nothing and the receiver does not allow a missing event.
pub fn extract_event(
    descriptor: &ReceiverDescriptor,
    headers: &HeaderList,
    body: &ParsedBody,
) -> Result<String, RejectionReason> {
    let found = match descriptor.event_source() {
        EventSource::Header { name } => headers
            .get(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string),
        EventSource::BodyPath { path } => resolve_event(body, path),
        EventSource::Constant { value } => Some(value.clone()),
    };

    match found {
        Some(event) => Ok(event),
        None if descriptor.allows_missing_event() => {
            debug!(receiver = %descriptor.name(), "event missing, using sentinel");
            Ok(UNSPECIFIED_EVENT.to_string())
        }
        None => Err(RejectionReason::EventMissing),
    }
}

/// Resolve `path` against a parsed body to a non-empty event name.
///
/// JSON leaves must be a non-blank string, a number or a boolean; numbers
/// and booleans are rendered as text. Raw bodies never resolve.
pub fn resolve_event(body: &ParsedBody, path: &PropertyPath) -> Option<String> {
    match body {
        ParsedBody::Json(value) => match path.resolve_json(value)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        },
        ParsedBody::Form(form) => form.resolve(path).map(str::to_string),
        ParsedBody::Xml(root) => root.resolve(path).map(str::to_string),
        ParsedBody::Raw(_) => None,
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
