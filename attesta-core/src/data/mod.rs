//! Ceremony data model: decoded WebAuthn structures and per-call parameters.
//!
//! Records own their byte buffers. Constructors copy the caller's slices and accessors
//! hand out shared borrows, so verified data cannot be mutated from outside.

pub mod attestation;
pub mod authenticator_data;
pub mod ceremony;
pub mod client_data;
pub mod cose;
pub mod credential;
pub mod extensions;
pub mod parameters;
pub mod server_property;

pub use attestation::{
    AndroidKeyStatement, AppleStatement, AttestationFormat, AttestationObject,
    AttestationStatement, FidoU2fStatement, NoneStatement, PackedStatement, SafetyNetStatement,
    TpmStatement,
};
pub use authenticator_data::{
    Aaguid, AttestedCredentialData, AuthenticatorData, AuthenticatorFlags,
    MAX_CREDENTIAL_ID_LEN,
};
pub use ceremony::{AuthenticationData, AuthenticationRequest, RegistrationData, RegistrationRequest};
pub use client_data::{ClientDataType, CollectedClientData, TokenBinding, TokenBindingStatus};
pub use cose::{CoseAlgorithm, CoseCurve, CoseKey, CoseKeyParams};
pub use credential::{AuthenticatorTransport, CoreCredentialRecord};
pub use extensions::{AuthenticatorExtensionOutputs, ClientExtensionOutputs, HmacGetSecretOutput};
pub use parameters::{
    AuthenticationParameters, PublicKeyCredentialParameters, PublicKeyCredentialType,
    RegistrationParameters,
};
pub use server_property::{Challenge, Origin, ServerProperty};
