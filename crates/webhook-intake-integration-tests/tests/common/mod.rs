//! Common test utilities for webhook-intake integration tests
//!
//! This module provides:
//! - Descriptor builders for the receiver shapes the tests exercise
//! - Request builders that attach content types and signatures

use bytes::Bytes;
use webhook_intake_core::{
    compute_signature, BodyEncoding, EventSource, HeaderList, HmacAlgorithm, IncomingRequest,
    ReceiverDescriptor, ReceiverName, ReceiverRegistry, SignatureScheme, SignatureSettings,
    WebhookSecret,
};

pub const SECRET: &[u8] = b"integration-secret";
pub const SIGNATURE_HEADER: &str = "X-Signature";

#[allow(dead_code)]
pub fn name(value: &str) -> ReceiverName {
    ReceiverName::new(value).expect("test receiver name is valid")
}

/// JSON receiver signed with HMAC-SHA256 in `X-Signature`.
#[allow(dead_code)]
pub fn signed_json_receiver(receiver: &str, event_path: &str) -> ReceiverDescriptor {
    ReceiverDescriptor::new(
        name(receiver),
        BodyEncoding::Json,
        EventSource::body_path(event_path).expect("test path is valid"),
    )
    .with_signature(SignatureScheme::HmacSha256(SignatureSettings::new(
        SIGNATURE_HEADER,
        WebhookSecret::from_bytes(SECRET.to_vec()),
    )))
}

#[allow(dead_code)]
pub fn registry_with(descriptors: impl IntoIterator<Item = ReceiverDescriptor>) -> ReceiverRegistry {
    ReceiverRegistry::from_descriptors(descriptors).expect("test descriptors are valid")
}

#[allow(dead_code)]
pub fn sign(body: &[u8]) -> String {
    compute_signature(HmacAlgorithm::Sha256, SECRET, body).expect("HMAC accepts any key length")
}

/// Request with a content type and an optional signature header.
#[allow(dead_code)]
pub fn request(content_type: &str, body: impl Into<Bytes>, signature: Option<&str>) -> IncomingRequest {
    let mut headers = HeaderList::new();
    headers.append("Content-Type", content_type);
    if let Some(signature) = signature {
        headers.append(SIGNATURE_HEADER, signature);
    }
    IncomingRequest::new(headers, body)
}

/// JSON request signed with [`SECRET`].
#[allow(dead_code)]
pub fn signed_json_request(body: &'static [u8]) -> IncomingRequest {
    request("application/json", Bytes::from_static(body), Some(&sign(body)))
}
