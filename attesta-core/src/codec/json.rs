//! WebAuthn JSON serialization of `PublicKeyCredential` responses.
//!
//! Binary members are base64url strings; see `RegistrationResponseJSON` and
//! `AuthenticationResponseJSON` in WebAuthn Level 3.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::base64url;
use crate::data::{AuthenticationRequest, ClientExtensionOutputs, RegistrationRequest};
use crate::error::{ConversionResult, DataConversionError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponseJson {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub raw_id: Option<String>,
    #[serde(rename = "type", default)]
    pub credential_type: Option<String>,
    pub response: AttestationResponseJson,
    #[serde(default)]
    pub authenticator_attachment: Option<String>,
    #[serde(default)]
    pub client_extension_results: ClientExtensionOutputs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponseJson {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub attestation_object: String,
    #[serde(default)]
    pub transports: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponseJson {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub raw_id: Option<String>,
    #[serde(rename = "type", default)]
    pub credential_type: Option<String>,
    pub response: AssertionResponseJson,
    #[serde(default)]
    pub authenticator_attachment: Option<String>,
    #[serde(default)]
    pub client_extension_results: ClientExtensionOutputs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponseJson {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
    #[serde(default)]
    pub user_handle: Option<String>,
}

fn check_credential_type(credential_type: Option<&str>) -> ConversionResult<()> {
    match credential_type {
        None | Some("public-key") => Ok(()),
        Some(other) => Err(DataConversionError::Json(format!(
            "unsupported credential type {other}"
        ))),
    }
}

impl RegistrationResponseJson {
    pub fn from_json(json: &str) -> ConversionResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Decode the base64url members into the raw request form.
    pub fn into_request(self) -> ConversionResult<(RegistrationRequest, ClientExtensionOutputs)> {
        check_credential_type(self.credential_type.as_deref())?;
        let request = RegistrationRequest {
            attestation_object: base64url::decode(&self.response.attestation_object)?,
            client_data_json: base64url::decode(&self.response.client_data_json)?,
            client_extensions_json: None,
            transports: self
                .response
                .transports
                .map(|t| t.into_iter().collect::<BTreeSet<_>>()),
        };
        Ok((request, self.client_extension_results))
    }
}

impl AuthenticationResponseJson {
    pub fn from_json(json: &str) -> ConversionResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Decode the base64url members into the raw request form.
    pub fn into_request(
        self,
    ) -> ConversionResult<(AuthenticationRequest, ClientExtensionOutputs)> {
        check_credential_type(self.credential_type.as_deref())?;
        let raw_id = self
            .raw_id
            .or(self.id)
            .ok_or_else(|| DataConversionError::Json("missing rawId".into()))?;
        let user_handle = match self.response.user_handle.as_deref() {
            None | Some("") => None,
            Some(handle) => Some(base64url::decode(handle)?),
        };
        let request = AuthenticationRequest {
            credential_id: base64url::decode(&raw_id)?,
            user_handle,
            authenticator_data: base64url::decode(&self.response.authenticator_data)?,
            client_data_json: base64url::decode(&self.response.client_data_json)?,
            client_extensions_json: None,
            signature: base64url::decode(&self.response.signature)?,
        };
        Ok((request, self.client_extension_results))
    }
}
