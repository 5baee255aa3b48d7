//! X.509 path validation against trust anchors.

use std::sync::Arc;

use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::X509VerifyFlags;
use openssl::x509::{X509StoreContext, X509VerifyResult, X509};
use tracing::{debug, warn};

use crate::attestation::CertificatePath;
use crate::error::{VerificationError, VerificationResult};

use super::anchors::{TrustAnchorQuery, TrustAnchorRepository};

// X509_V_ERR_* codes meaning "no trusted issuer was found"
const UNABLE_TO_GET_ISSUER_CERT: i32 = 2;
const DEPTH_ZERO_SELF_SIGNED_CERT: i32 = 18;
const SELF_SIGNED_CERT_IN_CHAIN: i32 = 19;
const UNABLE_TO_GET_ISSUER_CERT_LOCALLY: i32 = 20;
const UNABLE_TO_VERIFY_LEAF_SIGNATURE: i32 = 21;

/// Decides whether a certificate-based attestation chains to a trusted anchor.
pub trait CertPathTrustworthinessVerifier: Send + Sync {
    fn verify(&self, query: &TrustAnchorQuery, path: &CertificatePath) -> VerificationResult<()>;
}

/// Path validation options shared by the sync and async pipelines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CertPathValidator {
    pub full_chain_prohibited: bool,
    pub skip_time_checks: bool,
}

impl CertPathValidator {
    /// Validate `path` (leaf first) against `anchors`.
    pub fn validate(&self, path: &CertificatePath, anchors: &[X509]) -> VerificationResult<()> {
        let leaf = path.require_leaf().map_err(|_| {
            VerificationError::certificate("certificate path is empty")
        })?;
        if anchors.is_empty() {
            return Err(VerificationError::TrustAnchorNotFound);
        }

        let anchor_ders = anchors
            .iter()
            .map(|a| a.to_der())
            .collect::<Result<Vec<_>, _>>()?;
        if self.full_chain_prohibited
            && path
                .iter()
                .any(|cert| anchor_ders.iter().any(|der| der.as_slice() == cert.der()))
        {
            return Err(VerificationError::certificate(
                "attestation chain contains a trust anchor",
            ));
        }

        let mut chain = Stack::new()?;
        for cert in path.intermediates() {
            chain.push(cert.x509().clone())?;
        }

        let mut store = X509StoreBuilder::new()?;
        let mut flags = X509VerifyFlags::PARTIAL_CHAIN;
        if self.skip_time_checks {
            flags |= X509VerifyFlags::NO_CHECK_TIME;
        }
        store.set_flags(flags)?;
        for anchor in anchors {
            store.add_cert(anchor.clone())?;
        }
        let store = store.build();

        let mut ctx = X509StoreContext::new()?;
        let failure = ctx.init(&store, leaf.x509(), &chain, |c| {
            if c.verify_cert()? {
                Ok(None)
            } else {
                Ok(Some((c.error(), c.error_depth())))
            }
        })?;

        match failure {
            None => {
                debug!(path_len = path.len(), "Certificate path validated");
                Ok(())
            }
            Some((error, depth)) => {
                warn!(depth, reason = error.error_string(), "Certificate path rejected");
                Err(map_verify_error(error))
            }
        }
    }
}

fn map_verify_error(error: X509VerifyResult) -> VerificationError {
    match error.as_raw() {
        UNABLE_TO_GET_ISSUER_CERT
        | DEPTH_ZERO_SELF_SIGNED_CERT
        | SELF_SIGNED_CERT_IN_CHAIN
        | UNABLE_TO_GET_ISSUER_CERT_LOCALLY
        | UNABLE_TO_VERIFY_LEAF_SIGNATURE => VerificationError::TrustAnchorNotFound,
        _ => VerificationError::certificate(error.error_string()),
    }
}

/// Looks anchors up in a repository and validates the path against them.
#[derive(Clone)]
pub struct DefaultCertPathTrustworthinessVerifier {
    repository: Arc<dyn TrustAnchorRepository>,
    validator: CertPathValidator,
}

impl DefaultCertPathTrustworthinessVerifier {
    pub fn new(repository: Arc<dyn TrustAnchorRepository>) -> Self {
        Self {
            repository,
            validator: CertPathValidator::default(),
        }
    }

    pub fn with_validator(mut self, validator: CertPathValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn validator(&self) -> CertPathValidator {
        self.validator
    }
}

impl CertPathTrustworthinessVerifier for DefaultCertPathTrustworthinessVerifier {
    fn verify(&self, query: &TrustAnchorQuery, path: &CertificatePath) -> VerificationResult<()> {
        let anchors = self.repository.find(query);
        debug!(
            anchors = anchors.len(),
            attestation_type = %query.attestation_type,
            "Resolved trust anchors"
        );
        self.validator.validate(path, &anchors)
    }
}

impl std::fmt::Debug for DefaultCertPathTrustworthinessVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultCertPathTrustworthinessVerifier")
            .field("validator", &self.validator)
            .finish()
    }
}

/// Accepts every path. Insecure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCertPathTrustworthinessVerifier;

impl CertPathTrustworthinessVerifier for NullCertPathTrustworthinessVerifier {
    fn verify(&self, _query: &TrustAnchorQuery, _path: &CertificatePath) -> VerificationResult<()> {
        Ok(())
    }
}
