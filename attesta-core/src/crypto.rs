//! Hashing and signature primitives shared by the verifiers.

use openssl::error::ErrorStack;
use openssl::hash::{hash, MessageDigest};
use openssl::pkey::{PKeyRef, Public};
use openssl::rsa::Padding;
use openssl::sign::{RsaPssSaltlen, Verifier};

use crate::data::cose::CoseAlgorithm;
use crate::error::{VerificationError, VerificationResult};

/// SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    openssl::sha::sha256(data)
}

/// Digest `data` with the hash that `alg` signs over.
///
/// EdDSA has no separate prehash; callers needing a digest for it (TPM extraData)
/// get SHA-256.
pub fn digest_for(alg: CoseAlgorithm, data: &[u8]) -> VerificationResult<Vec<u8>> {
    let md = alg.message_digest().unwrap_or_else(MessageDigest::sha256);
    Ok(hash(md, data)?.to_vec())
}

/// Constant-time equality for secrets such as challenges.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && openssl::memcmp::eq(a, b)
}

/// Verify `signature` over `data` with `key` using the COSE algorithm `alg`.
///
/// Returns [`VerificationError::BadSignature`] for a wrong signature, for signatures
/// the backend cannot decode, and for a key that does not fit `alg`.
pub fn verify_signature(
    key: &PKeyRef<Public>,
    alg: CoseAlgorithm,
    data: &[u8],
    signature: &[u8],
) -> VerificationResult<()> {
    let outcome = || -> Result<bool, ErrorStack> {
        match alg.message_digest() {
            Some(md) => {
                let mut verifier = Verifier::new(md, key)?;
                if alg.is_pss() {
                    verifier.set_rsa_padding(Padding::PKCS1_PSS)?;
                    verifier.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
                }
                verifier.update(data)?;
                verifier.verify(signature)
            }
            None => {
                let mut verifier = Verifier::new_without_digest(key)?;
                verifier.verify_oneshot(signature, data)
            }
        }
    };

    match outcome() {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(VerificationError::BadSignature),
    }
}
