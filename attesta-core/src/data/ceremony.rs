//! Ceremony inputs (raw request forms) and parsed ceremony records.

use std::collections::BTreeSet;

use super::attestation::AttestationObject;
use super::authenticator_data::AuthenticatorData;
use super::client_data::CollectedClientData;
use super::credential::AuthenticatorTransport;
use super::extensions::ClientExtensionOutputs;

/// Raw-byte form of a registration response.
#[derive(Debug, Clone, Default)]
pub struct RegistrationRequest {
    pub attestation_object: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub client_extensions_json: Option<String>,
    pub transports: Option<BTreeSet<String>>,
}

impl RegistrationRequest {
    pub fn new(attestation_object: &[u8], client_data_json: &[u8]) -> Self {
        Self {
            attestation_object: attestation_object.to_vec(),
            client_data_json: client_data_json.to_vec(),
            client_extensions_json: None,
            transports: None,
        }
    }
}

/// Raw-byte form of an authentication response.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationRequest {
    pub credential_id: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
    pub authenticator_data: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub client_extensions_json: Option<String>,
    pub signature: Vec<u8>,
}

/// A parsed, not yet verified registration.
#[derive(Debug, Clone)]
pub struct RegistrationData {
    attestation_object: AttestationObject,
    attestation_object_bytes: Vec<u8>,
    collected_client_data: CollectedClientData,
    collected_client_data_bytes: Vec<u8>,
    client_extensions: ClientExtensionOutputs,
    transports: Option<BTreeSet<AuthenticatorTransport>>,
}

impl RegistrationData {
    pub fn new(
        attestation_object: AttestationObject,
        attestation_object_bytes: &[u8],
        collected_client_data: CollectedClientData,
        collected_client_data_bytes: &[u8],
        client_extensions: ClientExtensionOutputs,
        transports: Option<BTreeSet<AuthenticatorTransport>>,
    ) -> Self {
        Self {
            attestation_object,
            attestation_object_bytes: attestation_object_bytes.to_vec(),
            collected_client_data,
            collected_client_data_bytes: collected_client_data_bytes.to_vec(),
            client_extensions,
            transports,
        }
    }

    pub fn attestation_object(&self) -> &AttestationObject {
        &self.attestation_object
    }

    pub fn attestation_object_bytes(&self) -> &[u8] {
        &self.attestation_object_bytes
    }

    pub fn collected_client_data(&self) -> &CollectedClientData {
        &self.collected_client_data
    }

    pub fn collected_client_data_bytes(&self) -> &[u8] {
        &self.collected_client_data_bytes
    }

    pub fn client_extensions(&self) -> &ClientExtensionOutputs {
        &self.client_extensions
    }

    pub fn transports(&self) -> Option<&BTreeSet<AuthenticatorTransport>> {
        self.transports.as_ref()
    }

    /// Credential id from the attested credential data, if present.
    pub fn credential_id(&self) -> Option<&[u8]> {
        self.attestation_object
            .authenticator_data()
            .attested_credential_data()
            .map(|d| d.credential_id())
    }
}

/// A parsed, not yet verified authentication.
#[derive(Debug, Clone)]
pub struct AuthenticationData {
    credential_id: Vec<u8>,
    user_handle: Option<Vec<u8>>,
    authenticator_data: AuthenticatorData,
    authenticator_data_bytes: Vec<u8>,
    collected_client_data: CollectedClientData,
    collected_client_data_bytes: Vec<u8>,
    client_extensions: ClientExtensionOutputs,
    signature: Vec<u8>,
}

impl AuthenticationData {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        credential_id: &[u8],
        user_handle: Option<&[u8]>,
        authenticator_data: AuthenticatorData,
        authenticator_data_bytes: &[u8],
        collected_client_data: CollectedClientData,
        collected_client_data_bytes: &[u8],
        client_extensions: ClientExtensionOutputs,
        signature: &[u8],
    ) -> Self {
        Self {
            credential_id: credential_id.to_vec(),
            user_handle: user_handle.map(<[u8]>::to_vec),
            authenticator_data,
            authenticator_data_bytes: authenticator_data_bytes.to_vec(),
            collected_client_data,
            collected_client_data_bytes: collected_client_data_bytes.to_vec(),
            client_extensions,
            signature: signature.to_vec(),
        }
    }

    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    pub fn user_handle(&self) -> Option<&[u8]> {
        self.user_handle.as_deref()
    }

    pub fn authenticator_data(&self) -> &AuthenticatorData {
        &self.authenticator_data
    }

    pub fn authenticator_data_bytes(&self) -> &[u8] {
        &self.authenticator_data_bytes
    }

    pub fn collected_client_data(&self) -> &CollectedClientData {
        &self.collected_client_data
    }

    pub fn collected_client_data_bytes(&self) -> &[u8] {
        &self.collected_client_data_bytes
    }

    pub fn client_extensions(&self) -> &ClientExtensionOutputs {
        &self.client_extensions
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}
