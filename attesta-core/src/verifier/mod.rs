//! Ceremony verification pipelines.
//!
//! Both pipelines run their checks in a fixed order and stop at the first failure. The
//! client-data, rpId and flag checks they share live here.

pub mod authentication;
pub mod custom;
pub mod registration;

pub use authentication::AuthenticationDataVerifier;
pub use custom::{CustomAuthenticationVerifier, CustomRegistrationVerifier};
pub use registration::RegistrationDataVerifier;

use tracing::debug;

use crate::crypto::constant_time_eq;
use crate::data::{
    AuthenticatorData, AuthenticatorFlags, ClientDataType, CollectedClientData, ServerProperty,
    TokenBindingStatus,
};
use crate::error::{VerificationError, VerificationResult};

/// Type, challenge, origin and token binding.
pub(crate) fn verify_client_data(
    client_data: &CollectedClientData,
    expected_type: ClientDataType,
    server_property: &ServerProperty,
) -> VerificationResult<()> {
    if !client_data.is_type(expected_type) {
        return Err(VerificationError::InconsistentClientDataType {
            expected: expected_type.as_str().to_string(),
            actual: client_data.ceremony_type().to_string(),
        });
    }

    if !constant_time_eq(client_data.challenge(), server_property.challenge().as_bytes()) {
        return Err(VerificationError::BadChallenge);
    }

    if !server_property.is_acceptable_origin(client_data.origin()) {
        return Err(VerificationError::BadOrigin(client_data.origin().to_string()));
    }

    if let Some(binding) = client_data.token_binding() {
        if binding.status() == TokenBindingStatus::Present {
            match (binding.id(), server_property.token_binding_id()) {
                (Some(client), Some(server)) if client == server => {}
                (_, None) => {
                    return Err(VerificationError::TokenBinding(
                        "client reports token binding but none is expected".into(),
                    ))
                }
                _ => {
                    return Err(VerificationError::TokenBinding(
                        "token binding id does not match".into(),
                    ))
                }
            }
        }
    }

    debug!(origin = client_data.origin(), "Client data verified");
    Ok(())
}

pub(crate) fn verify_rp_id_hash(
    authenticator_data: &AuthenticatorData,
    server_property: &ServerProperty,
) -> VerificationResult<()> {
    if authenticator_data.rp_id_hash() != &server_property.rp_id_hash() {
        return Err(VerificationError::BadRpId);
    }
    Ok(())
}

pub(crate) fn verify_user_flags(
    flags: AuthenticatorFlags,
    user_presence_required: bool,
    user_verification_required: bool,
) -> VerificationResult<()> {
    if user_presence_required && !flags.user_present() {
        return Err(VerificationError::UserNotPresent);
    }
    if user_verification_required && !flags.user_verified() {
        return Err(VerificationError::UserNotVerified);
    }
    Ok(())
}

/// BS may only be set on backup-eligible credentials.
pub(crate) fn verify_backup_flags(flags: AuthenticatorFlags) -> VerificationResult<()> {
    if flags.backup_state() && !flags.backup_eligible() {
        return Err(VerificationError::IllegalBackupState(
            "backup state set on a credential that is not backup eligible".into(),
        ));
    }
    Ok(())
}
