#![no_main]

//! Fuzz target for AttestationObject::parse()
//!
//! Decoded objects are also run through the strict registration pipeline, so
//! statement verifiers see structurally valid but otherwise arbitrary input.
//!
//! Run with: cargo +nightly fuzz run fuzz_attestation_object

use attesta_core::{
    Challenge, Origin, RegistrationParameters, RegistrationRequest, ServerProperty,
    WebAuthnManager,
};
use libfuzzer_sys::fuzz_target;

const CLIENT_DATA: &[u8] =
    br#"{"type":"webauthn.create","challenge":"AAAA","origin":"https://example.com"}"#;

fuzz_target!(|data: &[u8]| {
    let Ok(origin) = Origin::new("https://example.com") else {
        return;
    };
    let params = RegistrationParameters::new(ServerProperty::new(
        origin,
        "example.com",
        Challenge::new(&[0, 0, 0]),
    ));
    // Errors are expected; panics are not
    let _ = WebAuthnManager::default()
        .verify_registration_request(&RegistrationRequest::new(data, CLIENT_DATA), &params);
});
