use tracing::debug;

use crate::attestation::VerifiedAttestation;
use crate::error::{VerificationError, VerificationResult};

/// Policy for attestations signed by the credential key itself.
pub trait SelfAttestationTrustworthinessVerifier: Send + Sync {
    fn verify(&self, attestation: &VerifiedAttestation) -> VerificationResult<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct DefaultSelfAttestationTrustworthinessVerifier {
    self_attestation_allowed: bool,
}

impl Default for DefaultSelfAttestationTrustworthinessVerifier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DefaultSelfAttestationTrustworthinessVerifier {
    pub fn new(self_attestation_allowed: bool) -> Self {
        Self {
            self_attestation_allowed,
        }
    }

    pub fn is_self_attestation_allowed(&self) -> bool {
        self.self_attestation_allowed
    }
}

impl SelfAttestationTrustworthinessVerifier for DefaultSelfAttestationTrustworthinessVerifier {
    fn verify(&self, _attestation: &VerifiedAttestation) -> VerificationResult<()> {
        if !self.self_attestation_allowed {
            return Err(VerificationError::SelfAttestationProhibited);
        }
        debug!("Self attestation accepted");
        Ok(())
    }
}

/// Accepts every self attestation. Insecure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSelfAttestationTrustworthinessVerifier;

impl SelfAttestationTrustworthinessVerifier for NullSelfAttestationTrustworthinessVerifier {
    fn verify(&self, _attestation: &VerifiedAttestation) -> VerificationResult<()> {
        Ok(())
    }
}
