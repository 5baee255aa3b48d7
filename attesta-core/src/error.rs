//! Error types for ceremony parsing and verification.
//!
//! Two families are kept apart: [`DataConversionError`] for input that cannot be decoded
//! at all, and [`VerificationError`] for input that decodes but violates a WebAuthn
//! invariant. [`WebAuthnError`] unifies both for the façade.

use thiserror::Error;

/// Malformed or undecodable input at the codec boundary.
#[derive(Error, Debug)]
pub enum DataConversionError {
    #[error("CBOR error: {0}")]
    Cbor(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Base64 error: {0}")]
    Base64(String),

    #[error("Invalid authenticator data: {0}")]
    AuthenticatorData(String),

    #[error("Invalid COSE key: {0}")]
    CoseKey(String),

    #[error("Invalid attestation object: {0}")]
    AttestationObject(String),

    #[error("Unknown attestation format: {0}")]
    UnknownAttestationFormat(String),

    #[error("Invalid client data: {0}")]
    ClientData(String),

    #[error("Invalid origin: {0}")]
    Origin(String),
}

impl From<serde_json::Error> for DataConversionError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

impl From<base64::DecodeError> for DataConversionError {
    fn from(e: base64::DecodeError) -> Self {
        Self::Base64(e.to_string())
    }
}

/// A violated protocol or cryptographic invariant.
///
/// Every variant maps to exactly one check; callers branch on the variant (or on
/// [`VerificationError::error_code`]) rather than on the message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Client data type mismatch: expected {expected}, got {actual}")]
    InconsistentClientDataType { expected: String, actual: String },

    #[error("Challenge does not match the expected challenge")]
    BadChallenge,

    #[error("Origin is not acceptable: {0}")]
    BadOrigin(String),

    #[error("Token binding mismatch: {0}")]
    TokenBinding(String),

    #[error("rpIdHash does not match SHA-256 of the expected rpId")]
    BadRpId,

    #[error("User presence flag is not set")]
    UserNotPresent,

    #[error("User verification flag is not set")]
    UserNotVerified,

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Illegal backup state: {0}")]
    IllegalBackupState(String),

    #[error("Algorithm {0} is not allowed")]
    BadAlgorithm(i64),

    #[error("Credential is not in the allowed credential list")]
    BadCredential,

    #[error("Signature verification failed")]
    BadSignature,

    #[error("Signature counter did not increase (stored={stored}, presented={presented}); the authenticator may be cloned")]
    MaliciousCounterValue { stored: u32, presented: u32 },

    #[error("Bad attestation statement: {0}")]
    BadAttestationStatement(String),

    #[error("No verifier is configured for attestation format {0}")]
    UnsupportedAttestationFormat(String),

    #[error("AAGUID mismatch between attestation certificate and authenticator data")]
    BadAaguid,

    #[error("Invalid key description: {0}")]
    KeyDescription(String),

    #[error("Attestation public key does not match the credential public key")]
    PublicKeyMismatch,

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("No trust anchor found for the attestation certificate path")]
    TrustAnchorNotFound,

    #[error("Self attestation is prohibited")]
    SelfAttestationProhibited,

    #[error("Rejected by custom verifier: {0}")]
    Custom(String),
}

impl VerificationError {
    /// Helper for malformed attestation statements.
    pub fn bad_statement(message: impl Into<String>) -> Self {
        Self::BadAttestationStatement(message.into())
    }

    /// Helper for certificate validation failures.
    pub fn certificate(message: impl Into<String>) -> Self {
        Self::Certificate(message.into())
    }

    /// Helper for custom verifier rejections.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Stable machine-readable code for logging and API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InconsistentClientDataType { .. } => "INCONSISTENT_CLIENT_DATA_TYPE",
            Self::BadChallenge => "BAD_CHALLENGE",
            Self::BadOrigin(_) => "BAD_ORIGIN",
            Self::TokenBinding(_) => "TOKEN_BINDING",
            Self::BadRpId => "BAD_RP_ID",
            Self::UserNotPresent => "USER_NOT_PRESENT",
            Self::UserNotVerified => "USER_NOT_VERIFIED",
            Self::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            Self::IllegalBackupState(_) => "ILLEGAL_BACKUP_STATE",
            Self::BadAlgorithm(_) => "BAD_ALGORITHM",
            Self::BadCredential => "BAD_CREDENTIAL",
            Self::BadSignature => "BAD_SIGNATURE",
            Self::MaliciousCounterValue { .. } => "MALICIOUS_COUNTER_VALUE",
            Self::BadAttestationStatement(_) => "BAD_ATTESTATION_STATEMENT",
            Self::UnsupportedAttestationFormat(_) => "UNSUPPORTED_ATTESTATION_FORMAT",
            Self::BadAaguid => "BAD_AAGUID",
            Self::KeyDescription(_) => "KEY_DESCRIPTION",
            Self::PublicKeyMismatch => "PUBLIC_KEY_MISMATCH",
            Self::Certificate(_) => "CERTIFICATE",
            Self::TrustAnchorNotFound => "TRUST_ANCHOR_NOT_FOUND",
            Self::SelfAttestationProhibited => "SELF_ATTESTATION_PROHIBITED",
            Self::Custom(_) => "CUSTOM_VERIFIER",
        }
    }

    /// True when the failure suggests a cloned authenticator.
    pub fn is_possible_clone(&self) -> bool {
        matches!(self, Self::MaliciousCounterValue { .. })
    }
}

impl From<openssl::error::ErrorStack> for VerificationError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::Certificate(e.to_string())
    }
}

/// Any failure surfaced by the façade.
#[derive(Error, Debug)]
pub enum WebAuthnError {
    #[error(transparent)]
    DataConversion(#[from] DataConversionError),

    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl WebAuthnError {
    /// Returns the verification error, if this is one.
    pub fn as_verification(&self) -> Option<&VerificationError> {
        match self {
            Self::Verification(e) => Some(e),
            Self::DataConversion(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, WebAuthnError>;

pub type VerificationResult<T> = std::result::Result<T, VerificationError>;

pub type ConversionResult<T> = std::result::Result<T, DataConversionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            VerificationError::BadChallenge,
            VerificationError::BadOrigin("x".into()),
            VerificationError::BadRpId,
            VerificationError::BadSignature,
            VerificationError::MaliciousCounterValue {
                stored: 1,
                presented: 1,
            },
            VerificationError::TrustAnchorNotFound,
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.error_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_only_counter_error_signals_clone() {
        assert!(VerificationError::MaliciousCounterValue {
            stored: 5,
            presented: 3
        }
        .is_possible_clone());
        assert!(!VerificationError::BadSignature.is_possible_clone());
    }

    #[test]
    fn test_webauthn_error_wraps_both_families() {
        let err: WebAuthnError = VerificationError::BadRpId.into();
        assert_eq!(err.as_verification(), Some(&VerificationError::BadRpId));

        let err: WebAuthnError = DataConversionError::Cbor("eof".into()).into();
        assert!(err.as_verification().is_none());
        assert!(err.to_string().contains("CBOR"));
    }
}
