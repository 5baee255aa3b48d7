//! Attesta Core - WebAuthn ceremony verification library
//!
//! This crate verifies the server side of WebAuthn Level 2 registration and
//! authentication ceremonies. It decodes what the browser returned, runs the ordered
//! protocol checks, verifies attestation statements and evaluates their trust.
//!
//! # Features
//!
//! - Attestation formats: none, packed, fido-u2f, tpm, android-key,
//!   android-safetynet, apple
//! - Certificate path validation against a pluggable trust anchor repository
//! - Signature counter and backup state checks for clone detection
//! - Caller-supplied custom verifiers that run after the built-in checks
//! - Optional async trust anchor lookup (`async` feature)
//!
//! The library is stateless. Challenge issuance and credential storage belong to the
//! caller.
//!
//! # Example
//!
//! ```no_run
//! use attesta_core::{
//!     Challenge, CoreCredentialRecord, Origin, RegistrationParameters, ServerProperty,
//!     WebAuthnManager,
//! };
//!
//! # fn example(response_json: &str, challenge: &[u8]) -> attesta_core::Result<()> {
//! let manager = WebAuthnManager::default();
//!
//! // The challenge is the one issued to this client for this ceremony
//! let server = ServerProperty::new(
//!     Origin::new("https://example.com")?,
//!     "example.com",
//!     Challenge::new(challenge),
//! );
//! let params = RegistrationParameters::new(server).with_user_verification_required(true);
//!
//! let registration = manager.verify_registration_response_json(response_json, &params)?;
//! let record = CoreCredentialRecord::from_registration(&registration);
//! # let _ = record;
//! # Ok(())
//! # }
//! ```

pub mod attestation;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod data;
pub mod error;
pub mod manager;
pub mod trust;
pub mod verifier;

// Re-export main types for convenience
pub use config::VerifierSettings;
pub use error::{
    ConversionResult, DataConversionError, Result, VerificationError, VerificationResult,
    WebAuthnError,
};
pub use manager::{WebAuthnManager, WebAuthnManagerConfig};

pub use data::{
    AttestationFormat, AttestationObject, AuthenticationData, AuthenticationParameters,
    AuthenticationRequest, AuthenticatorData, Challenge, CoreCredentialRecord, CoseAlgorithm,
    Origin, PublicKeyCredentialParameters, RegistrationData, RegistrationParameters,
    RegistrationRequest, ServerProperty,
};

pub use attestation::{AttestationType, AttestationVerifiers, VerifiedAttestation};
pub use trust::{InMemoryTrustAnchorRepository, TrustAnchorQuery, TrustAnchorRepository};

// Non-blocking trust anchor resolution
#[cfg(feature = "async")]
pub use manager::AsyncWebAuthnManager;
#[cfg(feature = "async")]
pub use trust::{AsyncTrustAnchorRepository, DirectoryTrustAnchorRepository};
