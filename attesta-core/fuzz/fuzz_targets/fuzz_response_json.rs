#![no_main]

//! Fuzz target for the RegistrationResponseJSON / AuthenticationResponseJSON decoders
//!
//! Run with: cargo +nightly fuzz run fuzz_response_json

use attesta_core::codec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let _ = codec::parse_registration_response_json(json);
    let _ = codec::parse_authentication_response_json(json);
});
