#![no_main]

//! Fuzz target for AuthenticatorData::parse()
//!
//! Run with: cargo +nightly fuzz run fuzz_authenticator_data

use attesta_core::AuthenticatorData;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(parsed) = AuthenticatorData::parse(data) {
        let _ = parsed.flags();
        let _ = parsed.attested_credential_data().map(|c| c.credential_public_key().to_pkey());
    }
});
