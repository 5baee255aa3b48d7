//! `apple` anonymous attestation (WebAuthn §8.8).

use der_parser::ber::BerObjectContent;
use der_parser::der::{parse_der, parse_der_octetstring};
use tracing::debug;

use crate::crypto;
use crate::data::{AttestationFormat, AttestationObject, AttestationStatement};
use crate::error::{VerificationError, VerificationResult};

use super::{
    attested_credential, require, signed_data, AttestationStatementVerifier, AttestationType,
    CertificatePath, VerifiedAttestation,
};

pub const APPLE_NONCE_EXTENSION_OID: &str = "1.2.840.113635.100.8.2";

/// Decode `SEQUENCE { [1] EXPLICIT OCTET STRING }`.
fn parse_nonce(value: &[u8]) -> Option<Vec<u8>> {
    let (_, outer) = parse_der(value).ok()?;
    let first = outer.as_sequence().ok()?.first()?;
    if first.header.tag().0 != 1 {
        return None;
    }
    let BerObjectContent::Unknown(any) = &first.content else {
        return None;
    };
    let inner: &[u8] = &any.data;
    let (_, nonce) = parse_der_octetstring(inner).ok()?;
    nonce.as_slice().ok().map(<[u8]>::to_vec)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppleAnonymousAttestationStatementVerifier;

impl AttestationStatementVerifier for AppleAnonymousAttestationStatementVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::Apple
    }

    fn verify(
        &self,
        object: &AttestationObject,
        client_data_hash: &[u8; 32],
    ) -> VerificationResult<VerifiedAttestation> {
        let AttestationStatement::Apple(statement) = object.statement() else {
            return Err(VerificationError::bad_statement("not an apple statement"));
        };
        let path = CertificatePath::from_x5c(require(statement.x5c.as_ref(), "x5c")?)?;
        let leaf = path.require_leaf()?;

        let expected = crypto::sha256(&signed_data(object, client_data_hash));
        let (_, value) = leaf
            .extension_value(APPLE_NONCE_EXTENSION_OID)?
            .ok_or_else(|| VerificationError::certificate("nonce extension is missing"))?;
        let nonce = parse_nonce(&value)
            .ok_or_else(|| VerificationError::certificate("nonce extension is malformed"))?;
        if nonce != expected {
            return Err(VerificationError::bad_statement(
                "nonce does not match SHA-256(authenticatorData || clientDataHash)",
            ));
        }

        let credential = attested_credential(object)?;
        let same_key = leaf
            .key_params()?
            .is_some_and(|p| p.same_key(credential.credential_public_key().params()));
        if !same_key {
            return Err(VerificationError::PublicKeyMismatch);
        }

        debug!("apple anonymous attestation verified");
        Ok(VerifiedAttestation::new(AttestationType::AnonCa, path))
    }
}
