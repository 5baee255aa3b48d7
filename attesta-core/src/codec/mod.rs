//! Decoding of raw ceremony input into ceremony records.
//!
//! Parsing never normalizes: the byte buffers kept in a record are exact copies of the
//! input, so signatures can be checked over them later.

pub mod base64url;
pub mod json;

use std::collections::BTreeSet;

use tracing::debug;

use crate::data::{
    AttestationObject, AuthenticationData, AuthenticationRequest, AuthenticatorData,
    AuthenticatorTransport, ClientExtensionOutputs, CollectedClientData, RegistrationData,
    RegistrationRequest,
};
use crate::error::ConversionResult;

pub use json::{AuthenticationResponseJson, RegistrationResponseJson};

fn client_extensions(
    json: Option<&str>,
    fallback: ClientExtensionOutputs,
) -> ConversionResult<ClientExtensionOutputs> {
    match json {
        Some(json) => ClientExtensionOutputs::from_json(json),
        None => Ok(fallback),
    }
}

fn transports(raw: Option<&BTreeSet<String>>) -> Option<BTreeSet<AuthenticatorTransport>> {
    raw.map(|set| set.iter().map(|t| AuthenticatorTransport::from(t.as_str())).collect())
}

/// Decode a raw registration request.
pub fn parse_registration_request(request: &RegistrationRequest) -> ConversionResult<RegistrationData> {
    parse_registration(request, ClientExtensionOutputs::default())
}

fn parse_registration(
    request: &RegistrationRequest,
    extensions: ClientExtensionOutputs,
) -> ConversionResult<RegistrationData> {
    let attestation_object = AttestationObject::parse(&request.attestation_object)?;
    let client_data = CollectedClientData::parse(&request.client_data_json)?;
    let extensions = client_extensions(request.client_extensions_json.as_deref(), extensions)?;

    debug!(
        format = %attestation_object.format(),
        flags = ?attestation_object.authenticator_data().flags(),
        "Parsed registration request"
    );

    Ok(RegistrationData::new(
        attestation_object,
        &request.attestation_object,
        client_data,
        &request.client_data_json,
        extensions,
        transports(request.transports.as_ref()),
    ))
}

/// Decode a raw authentication request.
pub fn parse_authentication_request(
    request: &AuthenticationRequest,
) -> ConversionResult<AuthenticationData> {
    parse_authentication(request, ClientExtensionOutputs::default())
}

fn parse_authentication(
    request: &AuthenticationRequest,
    extensions: ClientExtensionOutputs,
) -> ConversionResult<AuthenticationData> {
    let authenticator_data = AuthenticatorData::parse(&request.authenticator_data)?;
    let client_data = CollectedClientData::parse(&request.client_data_json)?;
    let extensions = client_extensions(request.client_extensions_json.as_deref(), extensions)?;

    debug!(
        flags = ?authenticator_data.flags(),
        sign_count = authenticator_data.sign_count(),
        "Parsed authentication request"
    );

    Ok(AuthenticationData::new(
        &request.credential_id,
        request.user_handle.as_deref(),
        authenticator_data,
        &request.authenticator_data,
        client_data,
        &request.client_data_json,
        extensions,
        &request.signature,
    ))
}

/// Decode a `RegistrationResponseJSON` document.
pub fn parse_registration_response_json(json: &str) -> ConversionResult<RegistrationData> {
    let (request, extensions) = RegistrationResponseJson::from_json(json)?.into_request()?;
    parse_registration(&request, extensions)
}

/// Decode an `AuthenticationResponseJSON` document.
pub fn parse_authentication_response_json(json: &str) -> ConversionResult<AuthenticationData> {
    let (request, extensions) = AuthenticationResponseJson::from_json(json)?.into_request()?;
    parse_authentication(&request, extensions)
}
