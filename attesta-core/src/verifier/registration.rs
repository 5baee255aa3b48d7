//! Registration ceremony verification (WebAuthn §7.1).

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::attestation::{AttestationType, AttestationVerifiers, VerifiedAttestation};
use crate::crypto;
use crate::data::{
    AttestationObject, ClientDataType, RegistrationData, RegistrationParameters,
    MAX_CREDENTIAL_ID_LEN,
};
use crate::error::{VerificationError, VerificationResult};
use crate::trust::{
    CertPathTrustworthinessVerifier, SelfAttestationTrustworthinessVerifier, TrustAnchorQuery,
};

use super::custom::CustomRegistrationVerifier;

/// Runs the ordered registration checks.
#[derive(Clone)]
pub struct RegistrationDataVerifier {
    attestation_verifiers: AttestationVerifiers,
    cert_path_verifier: Arc<dyn CertPathTrustworthinessVerifier>,
    self_attestation_verifier: Arc<dyn SelfAttestationTrustworthinessVerifier>,
    custom_verifiers: Vec<Arc<dyn CustomRegistrationVerifier>>,
}

impl RegistrationDataVerifier {
    pub fn new(
        attestation_verifiers: AttestationVerifiers,
        cert_path_verifier: Arc<dyn CertPathTrustworthinessVerifier>,
        self_attestation_verifier: Arc<dyn SelfAttestationTrustworthinessVerifier>,
        custom_verifiers: Vec<Arc<dyn CustomRegistrationVerifier>>,
    ) -> Self {
        Self {
            attestation_verifiers,
            cert_path_verifier,
            self_attestation_verifier,
            custom_verifiers,
        }
    }

    pub fn attestation_verifiers(&self) -> &AttestationVerifiers {
        &self.attestation_verifiers
    }

    /// Custom verifiers, in the order they run.
    pub fn custom_verifiers(&self) -> &[Arc<dyn CustomRegistrationVerifier>] {
        &self.custom_verifiers
    }

    /// Verify a parsed registration; returns what the attestation statement proved.
    #[instrument(
        level = "debug",
        skip_all,
        fields(
            rp_id = parameters.server_property().rp_id(),
            format = %data.attestation_object().format(),
        )
    )]
    pub fn verify(
        &self,
        data: &RegistrationData,
        parameters: &RegistrationParameters,
    ) -> VerificationResult<VerifiedAttestation> {
        let result = self
            .verify_attestation_statement(data, parameters)
            .and_then(|verified| {
                self.verify_trustworthiness(data.attestation_object(), &verified)?;
                self.run_custom_verifiers(data, parameters)?;
                Ok(verified)
            });

        match &result {
            Ok(verified) => debug!(
                attestation_type = %verified.attestation_type,
                "Registration verified"
            ),
            Err(err) => warn!(code = err.error_code(), error = %err, "Registration rejected"),
        }
        result
    }

    /// Everything up to and including the attestation statement check.
    pub(crate) fn verify_attestation_statement(
        &self,
        data: &RegistrationData,
        parameters: &RegistrationParameters,
    ) -> VerificationResult<VerifiedAttestation> {
        let server_property = parameters.server_property();
        super::verify_client_data(
            data.collected_client_data(),
            ClientDataType::Create,
            server_property,
        )?;

        let object = data.attestation_object();
        let authenticator_data = object.authenticator_data();
        super::verify_rp_id_hash(authenticator_data, server_property)?;

        let flags = authenticator_data.flags();
        super::verify_user_flags(
            flags,
            parameters.user_presence_required(),
            parameters.user_verification_required(),
        )?;

        let credential = authenticator_data
            .attested_credential_data()
            .filter(|_| flags.attested_credential_data())
            .ok_or_else(|| {
                VerificationError::ConstraintViolation(
                    "registration must carry attested credential data".into(),
                )
            })?;
        if credential.credential_id().len() > MAX_CREDENTIAL_ID_LEN {
            return Err(VerificationError::ConstraintViolation(format!(
                "credential id is {} bytes, at most {MAX_CREDENTIAL_ID_LEN} allowed",
                credential.credential_id().len()
            )));
        }
        super::verify_backup_flags(flags)?;
        debug!(flags = ?flags, "Authenticator data verified");

        if let Some(allowed) = parameters.pub_key_cred_params() {
            let alg = credential.credential_public_key().algorithm();
            if !allowed.iter().any(|p| p.alg == alg) {
                return Err(VerificationError::BadAlgorithm(alg.value()));
            }
        }

        let client_data_hash = crypto::sha256(data.collected_client_data_bytes());
        self.attestation_verifiers.verify(object, &client_data_hash)
    }

    /// Route the attestation to the trust check that fits its type.
    pub(crate) fn verify_trustworthiness(
        &self,
        object: &AttestationObject,
        verified: &VerifiedAttestation,
    ) -> VerificationResult<()> {
        match verified.attestation_type {
            AttestationType::Basic | AttestationType::AttCa | AttestationType::AnonCa => {
                let query = TrustAnchorQuery::for_attestation(object, verified)?;
                self.cert_path_verifier.verify(&query, &verified.trust_path)
            }
            AttestationType::SelfAttestation => self.self_attestation_verifier.verify(verified),
            AttestationType::None | AttestationType::Uncertain => Ok(()),
        }
    }

    pub(crate) fn run_custom_verifiers(
        &self,
        data: &RegistrationData,
        parameters: &RegistrationParameters,
    ) -> VerificationResult<()> {
        for verifier in &self.custom_verifiers {
            verifier.verify(data, parameters)?;
        }
        Ok(())
    }
}

impl fmt::Debug for RegistrationDataVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationDataVerifier")
            .field("attestation_verifiers", &self.attestation_verifiers)
            .field("custom_verifiers", &self.custom_verifiers.len())
            .finish()
    }
}
