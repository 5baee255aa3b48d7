//! Attestation statement verification.
//!
//! One verifier per `fmt`. Each checks that the statement is internally consistent
//! (signature, certificate requirements, binding to the credential) and reports which
//! kind of attestation it saw. Whether that attestation is *trustworthy* is decided
//! later by [`crate::trust`].

pub mod android_key;
pub mod android_safetynet;
pub mod apple;
pub mod certificate;
pub mod fido_u2f;
pub mod none;
pub mod packed;
pub mod tpm;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::VerifierSettings;
use crate::data::{AttestationFormat, AttestationObject};
use crate::error::{VerificationError, VerificationResult};

pub use android_key::AndroidKeyAttestationStatementVerifier;
pub use android_safetynet::AndroidSafetyNetAttestationStatementVerifier;
pub use apple::AppleAnonymousAttestationStatementVerifier;
pub use certificate::{AttestationCertificate, CertificatePath};
pub use fido_u2f::FidoU2fAttestationStatementVerifier;
pub use none::NoneAttestationStatementVerifier;
pub use packed::PackedAttestationStatementVerifier;
pub use tpm::TpmAttestationStatementVerifier;

/// Attestation types from WebAuthn §6.5.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationType {
    Basic,
    #[serde(rename = "self")]
    SelfAttestation,
    AttCa,
    AnonCa,
    None,
    Uncertain,
}

impl AttestationType {
    /// Types whose trust path is an X.509 chain.
    pub fn is_certificate_based(self) -> bool {
        matches!(self, Self::Basic | Self::AttCa | Self::AnonCa)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::SelfAttestation => "self",
            Self::AttCa => "attca",
            Self::AnonCa => "anonca",
            Self::None => "none",
            Self::Uncertain => "uncertain",
        }
    }
}

impl fmt::Display for AttestationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful statement check.
#[derive(Debug, Clone)]
pub struct VerifiedAttestation {
    pub attestation_type: AttestationType,
    /// Leaf-first chain the statement was verified with; empty unless certificate based.
    pub trust_path: CertificatePath,
}

impl VerifiedAttestation {
    pub fn new(attestation_type: AttestationType, trust_path: CertificatePath) -> Self {
        Self {
            attestation_type,
            trust_path,
        }
    }

    pub fn without_path(attestation_type: AttestationType) -> Self {
        Self::new(attestation_type, CertificatePath::default())
    }
}

/// Verifies the attestation statement of one format.
pub trait AttestationStatementVerifier: Send + Sync {
    /// The `fmt` this verifier handles.
    fn format(&self) -> AttestationFormat;

    /// Check `object`'s statement against its authenticator data and the client data hash.
    fn verify(
        &self,
        object: &AttestationObject,
        client_data_hash: &[u8; 32],
    ) -> VerificationResult<VerifiedAttestation>;
}

/// Accepts any statement of `format` and reports attestation type `None`.
///
/// Insecure: only for relying parties that do not evaluate attestation at all.
#[derive(Debug, Clone, Copy)]
pub struct NullAttestationStatementVerifier {
    format: AttestationFormat,
}

impl NullAttestationStatementVerifier {
    pub fn new(format: AttestationFormat) -> Self {
        Self { format }
    }
}

impl AttestationStatementVerifier for NullAttestationStatementVerifier {
    fn format(&self) -> AttestationFormat {
        self.format
    }

    fn verify(
        &self,
        _object: &AttestationObject,
        _client_data_hash: &[u8; 32],
    ) -> VerificationResult<VerifiedAttestation> {
        Ok(VerifiedAttestation::without_path(AttestationType::None))
    }
}

/// Format-keyed set of statement verifiers.
#[derive(Clone, Default)]
pub struct AttestationVerifiers {
    verifiers: Vec<Arc<dyn AttestationStatementVerifier>>,
}

impl AttestationVerifiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in format, configured from `settings`.
    pub fn strict(settings: &VerifierSettings) -> Self {
        Self::new()
            .with(NoneAttestationStatementVerifier)
            .with(FidoU2fAttestationStatementVerifier)
            .with(PackedAttestationStatementVerifier)
            .with(TpmAttestationStatementVerifier)
            .with(AndroidKeyAttestationStatementVerifier::new(
                settings.android_tee_enforced_only,
            ))
            .with(AndroidSafetyNetAttestationStatementVerifier::new(
                settings.safetynet_clock_skew,
            ))
            .with(AppleAnonymousAttestationStatementVerifier)
    }

    /// A [`NullAttestationStatementVerifier`] for every format.
    pub fn non_strict() -> Self {
        AttestationFormat::ALL
            .into_iter()
            .fold(Self::new(), |set, format| {
                set.with(NullAttestationStatementVerifier::new(format))
            })
    }

    /// Add a verifier, replacing any earlier one for the same format.
    pub fn with(mut self, verifier: impl AttestationStatementVerifier + 'static) -> Self {
        self.insert(Arc::new(verifier));
        self
    }

    pub fn insert(&mut self, verifier: Arc<dyn AttestationStatementVerifier>) {
        let format = verifier.format();
        self.verifiers.retain(|v| v.format() != format);
        self.verifiers.push(verifier);
    }

    pub fn get(&self, format: AttestationFormat) -> Option<&Arc<dyn AttestationStatementVerifier>> {
        self.verifiers.iter().find(|v| v.format() == format)
    }

    pub fn formats(&self) -> Vec<AttestationFormat> {
        self.verifiers.iter().map(|v| v.format()).collect()
    }

    /// Route `object` to the verifier registered for its format.
    pub fn verify(
        &self,
        object: &AttestationObject,
        client_data_hash: &[u8; 32],
    ) -> VerificationResult<VerifiedAttestation> {
        let format = object.format();
        let verifier = self
            .get(format)
            .ok_or_else(|| VerificationError::UnsupportedAttestationFormat(format.to_string()))?;
        let verified = verifier.verify(object, client_data_hash)?;
        debug!(
            %format,
            attestation_type = %verified.attestation_type,
            path_len = verified.trust_path.len(),
            "Attestation statement verified"
        );
        Ok(verified)
    }
}

impl fmt::Debug for AttestationVerifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttestationVerifiers")
            .field("formats", &self.formats())
            .finish()
    }
}

/// `authenticatorData || clientDataHash`, the message most formats sign.
pub(crate) fn signed_data(object: &AttestationObject, client_data_hash: &[u8; 32]) -> Vec<u8> {
    let auth_data = object.authenticator_data_bytes();
    let mut data = Vec::with_capacity(auth_data.len() + client_data_hash.len());
    data.extend_from_slice(auth_data);
    data.extend_from_slice(client_data_hash);
    data
}

/// Attested credential data, which registration always carries.
pub(crate) fn attested_credential(
    object: &AttestationObject,
) -> VerificationResult<&crate::data::AttestedCredentialData> {
    object
        .authenticator_data()
        .attested_credential_data()
        .ok_or_else(|| {
            VerificationError::ConstraintViolation("attested credential data is missing".into())
        })
}

pub(crate) fn require<T>(member: Option<T>, name: &str) -> VerificationResult<T> {
    member.ok_or_else(|| VerificationError::bad_statement(format!("{name} is missing")))
}
