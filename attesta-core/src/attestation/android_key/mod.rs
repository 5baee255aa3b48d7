//! `android-key` attestation (WebAuthn §8.4).

pub mod key_description;

use tracing::debug;

use crate::data::{AttestationFormat, AttestationObject, AttestationStatement, CoseAlgorithm};
use crate::error::{VerificationError, VerificationResult};

use super::{
    attested_credential, require, signed_data, AttestationStatementVerifier, AttestationType,
    CertificatePath, VerifiedAttestation,
};
use key_description::{
    AuthorizationList, KeyDescription, KEY_DESCRIPTION_OID, KM_ORIGIN_GENERATED, KM_PURPOSE_SIGN,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct AndroidKeyAttestationStatementVerifier {
    tee_enforced_only: bool,
}

impl AndroidKeyAttestationStatementVerifier {
    /// With `tee_enforced_only`, origin and purpose must come from the TEE-enforced list.
    pub fn new(tee_enforced_only: bool) -> Self {
        Self { tee_enforced_only }
    }

    fn check_authorizations(&self, description: &KeyDescription) -> VerificationResult<()> {
        let tee = &description.tee_enforced;
        let software = &description.software_enforced;
        if tee.all_applications || software.all_applications {
            return Err(VerificationError::KeyDescription(
                "key is bound to all applications".into(),
            ));
        }

        let lists: &[&AuthorizationList] = if self.tee_enforced_only {
            &[tee]
        } else {
            &[tee, software]
        };
        if !lists
            .iter()
            .any(|l| l.origin == Some(KM_ORIGIN_GENERATED))
        {
            return Err(VerificationError::KeyDescription(
                "key origin is not KM_ORIGIN_GENERATED".into(),
            ));
        }
        if !lists
            .iter()
            .any(|l| l.purpose.contains(&KM_PURPOSE_SIGN))
        {
            return Err(VerificationError::KeyDescription(
                "key purpose does not include KM_PURPOSE_SIGN".into(),
            ));
        }
        Ok(())
    }
}

impl AttestationStatementVerifier for AndroidKeyAttestationStatementVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::AndroidKey
    }

    fn verify(
        &self,
        object: &AttestationObject,
        client_data_hash: &[u8; 32],
    ) -> VerificationResult<VerifiedAttestation> {
        let AttestationStatement::AndroidKey(statement) = object.statement() else {
            return Err(VerificationError::bad_statement("not an android-key statement"));
        };
        let alg_id = require(statement.alg, "alg")?;
        let alg = CoseAlgorithm::from_i64(alg_id)
            .ok_or_else(|| VerificationError::bad_statement(format!("unsupported alg {alg_id}")))?;
        let sig = require(statement.sig.as_ref(), "sig")?;
        let path = CertificatePath::from_x5c(require(statement.x5c.as_ref(), "x5c")?)?;
        let leaf = path.require_leaf()?;

        let (_, extension) = leaf.extension_value(KEY_DESCRIPTION_OID)?.ok_or_else(|| {
            VerificationError::KeyDescription("key description extension is missing".into())
        })?;
        let description =
            KeyDescription::parse(&extension).map_err(VerificationError::KeyDescription)?;

        leaf.verify_signature(alg, &signed_data(object, client_data_hash), sig)?;

        let credential = attested_credential(object)?;
        let same_key = leaf
            .key_params()?
            .is_some_and(|p| p.same_key(credential.credential_public_key().params()));
        if !same_key {
            return Err(VerificationError::PublicKeyMismatch);
        }

        if description.attestation_challenge.as_slice() != client_data_hash.as_slice() {
            return Err(VerificationError::KeyDescription(
                "attestationChallenge does not match clientDataHash".into(),
            ));
        }
        self.check_authorizations(&description)?;

        debug!(
            attestation_security_level = ?description.attestation_security_level,
            "android-key attestation verified"
        );
        Ok(VerifiedAttestation::new(AttestationType::Basic, path))
    }
}

#[cfg(test)]
mod tests {
    use super::key_description::SecurityLevel;
    use super::*;

    fn description(tee: AuthorizationList, software: AuthorizationList) -> KeyDescription {
        KeyDescription {
            attestation_version: 3,
            attestation_security_level: SecurityLevel::TrustedEnvironment,
            keymaster_version: 4,
            keymaster_security_level: SecurityLevel::TrustedEnvironment,
            attestation_challenge: vec![],
            software_enforced: software,
            tee_enforced: tee,
        }
    }

    fn generated_signing_key() -> AuthorizationList {
        AuthorizationList {
            purpose: vec![KM_PURPOSE_SIGN],
            origin: Some(KM_ORIGIN_GENERATED),
            all_applications: false,
        }
    }

    #[test]
    fn test_tee_list_satisfies_authorizations() {
        let verifier = AndroidKeyAttestationStatementVerifier::new(true);
        let desc = description(generated_signing_key(), AuthorizationList::default());
        verifier
            .check_authorizations(&desc)
            .expect("TEE-enforced key should pass");
    }

    /// Software-enforced authorizations only count when TEE-only mode is off
    #[test]
    fn test_software_list_depends_on_tee_only() {
        let desc = description(AuthorizationList::default(), generated_signing_key());
        assert!(AndroidKeyAttestationStatementVerifier::new(false)
            .check_authorizations(&desc)
            .is_ok());
        assert!(matches!(
            AndroidKeyAttestationStatementVerifier::new(true).check_authorizations(&desc),
            Err(VerificationError::KeyDescription(_))
        ));
    }

    #[test]
    fn test_all_applications_rejected() {
        let mut software = AuthorizationList::default();
        software.all_applications = true;
        let desc = description(generated_signing_key(), software);
        assert!(AndroidKeyAttestationStatementVerifier::default()
            .check_authorizations(&desc)
            .is_err());
    }
}
