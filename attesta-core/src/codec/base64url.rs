//! Lenient base64url: padding is accepted on input, never produced on output.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::ConversionResult;

pub fn decode(encoded: &str) -> ConversionResult<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('='))?)
}

pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}
