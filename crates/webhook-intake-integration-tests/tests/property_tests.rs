//! Property tests for signature verification and the registry.

mod common;

use bytes::Bytes;
use common::*;
use proptest::prelude::*;
use webhook_intake_core::{
    BodyEncoding, Dispatcher, EventSource, ReceiverDescriptor, ReceiverRegistry, RejectionReason,
    VerificationOutcome,
};

// Strategy: JSON object bodies carrying an event name
fn arb_body() -> impl Strategy<Value = Vec<u8>> {
    (
        prop::string::string_regex("[a-z][a-z0-9_.]{0,15}").unwrap(),
        prop::string::string_regex("[ -~]{0,40}").unwrap(),
    )
        .prop_map(|(event, filler)| {
            serde_json::json!({ "event": event, "filler": filler })
                .to_string()
                .into_bytes()
        })
}

// Strategy: valid receiver names
fn arb_name() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9_-]{1,20}").unwrap()
}

proptest! {
    /// Property: a correctly signed body is always accepted
    #[test]
    fn proptest_correct_signature_accepted(body in arb_body()) {
        let registry = registry_with([signed_json_receiver("pusher", "event")]);
        let signature = sign(&body);
        let req = request("application/json", Bytes::from(body), Some(&signature));

        let outcome = Dispatcher::new(&registry).dispatch("pusher", &req);
        prop_assert!(outcome.is_accepted(), "got {:?}", outcome);
    }

    /// Property: flipping any single bit of the body is detected
    #[test]
    fn proptest_body_bit_flip_is_mismatch(body in arb_body(), position in any::<prop::sample::Index>(), bit in 0u8..8) {
        let registry = registry_with([signed_json_receiver("pusher", "event")]);
        let signature = sign(&body);

        let mut tampered = body.clone();
        let index = position.index(tampered.len());
        tampered[index] ^= 1 << bit;

        let req = request("application/json", Bytes::from(tampered), Some(&signature));
        prop_assert_eq!(
            Dispatcher::new(&registry).dispatch("pusher", &req),
            VerificationOutcome::Rejected(RejectionReason::SignatureMismatch)
        );
    }

    /// Property: flipping any single bit of the MAC is detected
    #[test]
    fn proptest_signature_bit_flip_is_mismatch(body in arb_body(), position in any::<prop::sample::Index>(), bit in 0u8..8) {
        let registry = registry_with([signed_json_receiver("pusher", "event")]);

        let mut mac = hex::decode(sign(&body)).unwrap();
        let index = position.index(mac.len());
        mac[index] ^= 1 << bit;
        let tampered = hex::encode(&mac);

        let req = request("application/json", Bytes::from(body), Some(&tampered));
        prop_assert_eq!(
            Dispatcher::new(&registry).dispatch("pusher", &req),
            VerificationOutcome::Rejected(RejectionReason::SignatureMismatch)
        );
    }

    /// Property: flipping any single bit of the header text is detected
    #[test]
    fn proptest_signature_header_bit_flip_is_mismatch(body in arb_body(), position in any::<prop::sample::Index>(), bit in 0u8..7) {
        let registry = registry_with([signed_json_receiver("pusher", "event")]);

        let mut header = sign(&body).into_bytes();
        let index = position.index(header.len());
        header[index] ^= 1 << bit;
        let tampered = String::from_utf8(header).unwrap();

        let req = request("application/json", Bytes::from(body), Some(&tampered));
        prop_assert_eq!(
            Dispatcher::new(&registry).dispatch("pusher", &req),
            VerificationOutcome::Rejected(RejectionReason::SignatureMismatch)
        );
    }

    /// Property: lookup after register returns the registered descriptor
    #[test]
    fn proptest_lookup_after_register(names in prop::collection::btree_set(arb_name(), 1..8)) {
        let descriptors: Vec<_> = names
            .iter()
            .map(|n| ReceiverDescriptor::new(name(n), BodyEncoding::Raw, EventSource::constant(n.clone())))
            .collect();

        let registry = ReceiverRegistry::from_descriptors(descriptors.clone()).unwrap();
        prop_assert_eq!(registry.len(), names.len());
        for descriptor in &descriptors {
            prop_assert_eq!(registry.lookup(descriptor.name().as_str()), Ok(descriptor));
        }
    }

    /// Property: registering a name twice always fails
    #[test]
    fn proptest_duplicate_registration_fails(n in arb_name()) {
        let descriptor = ReceiverDescriptor::new(name(&n), BodyEncoding::Raw, EventSource::constant("e"));
        let mut registry = ReceiverRegistry::new();
        registry.register(descriptor.clone()).unwrap();
        prop_assert!(registry.register(descriptor).is_err());
    }
}
