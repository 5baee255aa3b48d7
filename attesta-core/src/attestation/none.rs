use crate::data::{AttestationFormat, AttestationObject, AttestationStatement};
use crate::error::{VerificationError, VerificationResult};

use super::{AttestationStatementVerifier, AttestationType, VerifiedAttestation};

/// `none`: nothing to verify, but the statement must be the empty map.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneAttestationStatementVerifier;

impl AttestationStatementVerifier for NoneAttestationStatementVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::None
    }

    fn verify(
        &self,
        object: &AttestationObject,
        _client_data_hash: &[u8; 32],
    ) -> VerificationResult<VerifiedAttestation> {
        let AttestationStatement::None(statement) = object.statement() else {
            return Err(VerificationError::bad_statement("not a none statement"));
        };
        if !statement.unexpected_members.is_empty() {
            return Err(VerificationError::bad_statement(format!(
                "none statement must be empty, found {}",
                statement.unexpected_members.join(", ")
            )));
        }
        Ok(VerifiedAttestation::without_path(AttestationType::None))
    }
}
