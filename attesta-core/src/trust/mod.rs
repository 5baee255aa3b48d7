//! Trustworthiness evaluation of verified attestations.
//!
//! Certificate-based attestations are checked by building a path to a trust anchor;
//! self attestation is a plain policy decision.

pub mod anchors;
#[cfg(feature = "async")]
pub mod async_anchors;
pub mod cert_path;
pub mod self_attestation;

pub use anchors::{
    AnchorScope, InMemoryTrustAnchorRepository, TrustAnchorError, TrustAnchorQuery,
    TrustAnchorRepository,
};
#[cfg(feature = "async")]
pub use async_anchors::{AsyncTrustAnchorRepository, DirectoryTrustAnchorRepository};
pub use cert_path::{
    CertPathTrustworthinessVerifier, CertPathValidator, DefaultCertPathTrustworthinessVerifier,
    NullCertPathTrustworthinessVerifier,
};
pub use self_attestation::{
    DefaultSelfAttestationTrustworthinessVerifier, NullSelfAttestationTrustworthinessVerifier,
    SelfAttestationTrustworthinessVerifier,
};
