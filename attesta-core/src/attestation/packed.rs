//! `packed` attestation (WebAuthn §8.2): full (x5c) and self attestation.

use tracing::debug;

use crate::data::{AttestationFormat, AttestationObject, AttestationStatement, CoseAlgorithm};
use crate::error::{VerificationError, VerificationResult};

use super::{
    attested_credential, require, signed_data, AttestationStatementVerifier, AttestationType,
    CertificatePath, VerifiedAttestation,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct PackedAttestationStatementVerifier;

impl AttestationStatementVerifier for PackedAttestationStatementVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::Packed
    }

    fn verify(
        &self,
        object: &AttestationObject,
        client_data_hash: &[u8; 32],
    ) -> VerificationResult<VerifiedAttestation> {
        let AttestationStatement::Packed(statement) = object.statement() else {
            return Err(VerificationError::bad_statement("not a packed statement"));
        };
        if statement.ecdaa_key_id.is_some() {
            return Err(VerificationError::bad_statement(
                "ECDAA attestation is not supported",
            ));
        }
        let alg_id = require(statement.alg, "alg")?;
        let alg = CoseAlgorithm::from_i64(alg_id)
            .ok_or_else(|| VerificationError::bad_statement(format!("unsupported alg {alg_id}")))?;
        let sig = require(statement.sig.as_ref(), "sig")?;
        let credential = attested_credential(object)?;
        let data = signed_data(object, client_data_hash);

        match statement.x5c.as_ref() {
            Some(x5c) => {
                let path = CertificatePath::from_x5c(x5c)?;
                let leaf = path.require_leaf()?;
                leaf.check_packed_requirements()?;
                leaf.verify_signature(alg, &data, sig)?;
                leaf.check_aaguid_extension(&credential.aaguid())?;
                debug!(%alg, "packed full attestation verified");
                Ok(VerifiedAttestation::new(AttestationType::Basic, path))
            }
            None => {
                let key = credential.credential_public_key();
                if key.algorithm() != alg {
                    return Err(VerificationError::bad_statement(format!(
                        "alg {alg} does not match credential algorithm {}",
                        key.algorithm()
                    )));
                }
                let public = key.to_pkey()?;
                crate::crypto::verify_signature(&public, alg, &data, sig)?;
                debug!(%alg, "packed self attestation verified");
                Ok(VerifiedAttestation::without_path(
                    AttestationType::SelfAttestation,
                ))
            }
        }
    }
}
