//! Request pipeline: lookup → verify → extract event → outcome.

use crate::{
    body,
    descriptor::ReceiverDescriptor,
    event,
    outcome::{RejectionReason, VerificationOutcome},
    registry::ReceiverRegistry,
    request::IncomingRequest,
};
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Where a request is in the pipeline.
///
/// ```text
/// Received → Verifying ──────────────→ Rejected
///                 └→ Verified → ExtractingEvent → Dispatched
///                                      └────────→ Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Received,
    Verifying,
    Verified,
    ExtractingEvent,
    Dispatched,
    Rejected,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dispatched | Self::Rejected)
    }

    /// Stage that follows a successful step out of this one.
    ///
    /// Terminal stages have no successor.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Verifying),
            Self::Verifying => Some(Self::Verified),
            Self::Verified => Some(Self::ExtractingEvent),
            Self::ExtractingEvent => Some(Self::Dispatched),
            Self::Dispatched | Self::Rejected => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Verifying => "verifying",
            Self::Verified => "verified",
            Self::ExtractingEvent => "extracting_event",
            Self::Dispatched => "dispatched",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run a request through verification and event extraction for a known
/// receiver.
pub fn process(descriptor: &ReceiverDescriptor, request: &IncomingRequest) -> VerificationOutcome {
    let receiver = descriptor.name();
    debug!(receiver = %receiver, stage = %PipelineStage::Verifying);

    let parsed = match body::verify(descriptor, request) {
        Ok(parsed) => parsed,
        Err(reason) => return VerificationOutcome::Rejected(reason),
    };

    debug!(receiver = %receiver, stage = %PipelineStage::Verified, body = %parsed.encoding());
    debug!(receiver = %receiver, stage = %PipelineStage::ExtractingEvent);
    match event::extract_event(descriptor, request.headers(), &parsed) {
        Ok(event) => VerificationOutcome::accepted(event, parsed),
        Err(reason) => VerificationOutcome::Rejected(reason),
    }
}

/// Dispatches requests to receivers in a shared registry.
///
/// Cheap to construct; one per request or one per process both work.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'a> {
    registry: &'a ReceiverRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a ReceiverRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'a ReceiverRegistry {
        self.registry
    }

    /// Verify `request` for `receiver` and extract its event.
    ///
    /// Never fails: every problem is reported as
    /// [`VerificationOutcome::Rejected`] with exactly one reason.
    #[instrument(skip(self, request), fields(body_len = request.body().len()))]
    pub fn dispatch(&self, receiver: &str, request: &IncomingRequest) -> VerificationOutcome {
        debug!(stage = %PipelineStage::Received);

        let outcome = match self.registry.lookup(receiver) {
            Ok(descriptor) => process(descriptor, request),
            Err(e) => VerificationOutcome::Rejected(RejectionReason::from(e)),
        };

        match &outcome {
            VerificationOutcome::Accepted { event, .. } => {
                info!(stage = %PipelineStage::Dispatched, event = %event, "webhook accepted");
            }
            VerificationOutcome::Rejected(reason) => {
                warn!(
                    stage = %PipelineStage::Rejected,
                    reason = %reason.as_str(),
                    status = reason.status_code(),
                    security = reason.is_security_failure(),
                    "webhook rejected"
                );
            }
        }
        outcome
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
