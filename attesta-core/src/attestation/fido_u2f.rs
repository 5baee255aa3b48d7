//! `fido-u2f` attestation (WebAuthn §8.6).

use tracing::debug;

use crate::data::{
    AttestationFormat, AttestationObject, AttestationStatement, CoseAlgorithm, CoseCurve,
    CoseKeyParams,
};
use crate::error::{VerificationError, VerificationResult};

use super::{
    attested_credential, require, AttestationStatementVerifier, AttestationType, CertificatePath,
    VerifiedAttestation,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct FidoU2fAttestationStatementVerifier;

impl AttestationStatementVerifier for FidoU2fAttestationStatementVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::FidoU2f
    }

    fn verify(
        &self,
        object: &AttestationObject,
        client_data_hash: &[u8; 32],
    ) -> VerificationResult<VerifiedAttestation> {
        let AttestationStatement::FidoU2f(statement) = object.statement() else {
            return Err(VerificationError::bad_statement("not a fido-u2f statement"));
        };
        let sig = require(statement.sig.as_ref(), "sig")?;
        let x5c = require(statement.x5c.as_ref(), "x5c")?;
        if x5c.len() != 1 {
            return Err(VerificationError::bad_statement(format!(
                "fido-u2f x5c must hold exactly one certificate, found {}",
                x5c.len()
            )));
        }
        let path = CertificatePath::from_x5c(x5c)?;
        let leaf = path.require_leaf()?;
        if !leaf.is_ec_p256()? {
            return Err(VerificationError::certificate(
                "fido-u2f attestation key must be EC P-256",
            ));
        }

        let credential = attested_credential(object)?;
        let (x, y) = match credential.credential_public_key().params() {
            CoseKeyParams::Ec2 {
                curve: CoseCurve::P256,
                x,
                y,
            } => (x, y),
            _ => {
                return Err(VerificationError::bad_statement(
                    "fido-u2f credential key must be EC2 P-256",
                ))
            }
        };

        // U2F raw registration message
        let credential_id = credential.credential_id();
        let mut data = Vec::with_capacity(1 + 32 + 32 + credential_id.len() + 65);
        data.push(0x00);
        data.extend_from_slice(object.authenticator_data().rp_id_hash());
        data.extend_from_slice(client_data_hash);
        data.extend_from_slice(credential_id);
        data.push(0x04);
        data.extend_from_slice(x);
        data.extend_from_slice(y);

        leaf.verify_signature(CoseAlgorithm::ES256, &data, sig)?;

        let self_attested = leaf
            .key_params()?
            .is_some_and(|params| params.same_key(credential.credential_public_key().params()));
        let attestation_type = if self_attested {
            AttestationType::SelfAttestation
        } else {
            AttestationType::Basic
        };
        debug!(%attestation_type, "fido-u2f signature verified");

        Ok(VerifiedAttestation::new(attestation_type, path))
    }
}
