//! Authentication ceremony verification (WebAuthn §7.2).

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::crypto;
use crate::data::{AuthenticationData, AuthenticationParameters, ClientDataType};
use crate::error::{VerificationError, VerificationResult};

use super::custom::CustomAuthenticationVerifier;

/// Runs the ordered authentication checks.
#[derive(Clone, Default)]
pub struct AuthenticationDataVerifier {
    custom_verifiers: Vec<Arc<dyn CustomAuthenticationVerifier>>,
}

impl AuthenticationDataVerifier {
    pub fn new(custom_verifiers: Vec<Arc<dyn CustomAuthenticationVerifier>>) -> Self {
        Self { custom_verifiers }
    }

    /// Custom verifiers, in the order they run.
    pub fn custom_verifiers(&self) -> &[Arc<dyn CustomAuthenticationVerifier>] {
        &self.custom_verifiers
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(
            rp_id = parameters.server_property().rp_id(),
            sign_count = data.authenticator_data().sign_count(),
        )
    )]
    pub fn verify(
        &self,
        data: &AuthenticationData,
        parameters: &AuthenticationParameters,
    ) -> VerificationResult<()> {
        let result = self.verify_ordered(data, parameters);
        match &result {
            Ok(()) => debug!("Authentication verified"),
            Err(err) => warn!(
                code = err.error_code(),
                possible_clone = err.is_possible_clone(),
                error = %err,
                "Authentication rejected"
            ),
        }
        result
    }

    fn verify_ordered(
        &self,
        data: &AuthenticationData,
        parameters: &AuthenticationParameters,
    ) -> VerificationResult<()> {
        let server_property = parameters.server_property();
        let record = parameters.credential_record();

        super::verify_client_data(
            data.collected_client_data(),
            ClientDataType::Get,
            server_property,
        )?;

        let authenticator_data = data.authenticator_data();
        super::verify_rp_id_hash(authenticator_data, server_property)?;

        let flags = authenticator_data.flags();
        super::verify_user_flags(
            flags,
            parameters.user_presence_required(),
            parameters.user_verification_required(),
        )?;

        if flags.attested_credential_data() || authenticator_data.attested_credential_data().is_some()
        {
            return Err(VerificationError::ConstraintViolation(
                "assertion must not carry attested credential data".into(),
            ));
        }
        super::verify_backup_flags(flags)?;
        if record.backup_eligible() == Some(false) && flags.backup_eligible() {
            return Err(VerificationError::IllegalBackupState(
                "credential was registered as not backup eligible".into(),
            ));
        }

        if let Some(allowed) = parameters.allow_credentials() {
            if !allowed.iter().any(|id| id.as_slice() == data.credential_id()) {
                return Err(VerificationError::BadCredential);
            }
        }

        let public_key = record.attested_credential_data().credential_public_key();
        let key = public_key
            .to_pkey()
            .map_err(|_| VerificationError::BadSignature)?;
        let client_data_hash = crypto::sha256(data.collected_client_data_bytes());
        let mut signed = data.authenticator_data_bytes().to_vec();
        signed.extend_from_slice(&client_data_hash);
        crypto::verify_signature(&key, public_key.algorithm(), &signed, data.signature())?;
        debug!(alg = %public_key.algorithm(), "Assertion signature verified");

        let stored = record.counter();
        let presented = authenticator_data.sign_count();
        if (stored != 0 || presented != 0) && presented <= stored {
            return Err(VerificationError::MaliciousCounterValue { stored, presented });
        }

        for verifier in &self.custom_verifiers {
            verifier.verify(data, parameters)?;
        }
        Ok(())
    }
}

impl fmt::Debug for AuthenticationDataVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationDataVerifier")
            .field("custom_verifiers", &self.custom_verifiers.len())
            .finish()
    }
}
