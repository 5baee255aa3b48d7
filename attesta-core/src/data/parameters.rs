//! Per-call verification policy.

use serde::{Deserialize, Serialize};

use super::cose::CoseAlgorithm;
use super::credential::CoreCredentialRecord;
use super::server_property::ServerProperty;

/// Credential type; WebAuthn defines only `public-key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PublicKeyCredentialType {
    #[default]
    #[serde(rename = "public-key")]
    PublicKey,
}

/// One entry of `pubKeyCredParams`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyCredentialParameters {
    #[serde(rename = "type")]
    pub credential_type: PublicKeyCredentialType,
    pub alg: CoseAlgorithm,
}

impl PublicKeyCredentialParameters {
    pub fn new(alg: CoseAlgorithm) -> Self {
        Self {
            credential_type: PublicKeyCredentialType::PublicKey,
            alg,
        }
    }
}

/// Registration policy.
///
/// Defaults: no algorithm constraint, user verification not required, user presence
/// required.
#[derive(Debug, Clone)]
pub struct RegistrationParameters {
    server_property: ServerProperty,
    pub_key_cred_params: Option<Vec<PublicKeyCredentialParameters>>,
    user_verification_required: bool,
    user_presence_required: bool,
}

impl RegistrationParameters {
    pub fn new(server_property: ServerProperty) -> Self {
        Self {
            server_property,
            pub_key_cred_params: None,
            user_verification_required: false,
            user_presence_required: true,
        }
    }

    /// Restrict the credential algorithm to those offered in `pubKeyCredParams`.
    pub fn with_pub_key_cred_params(
        mut self,
        params: impl IntoIterator<Item = PublicKeyCredentialParameters>,
    ) -> Self {
        self.pub_key_cred_params = Some(params.into_iter().collect());
        self
    }

    pub fn with_user_verification_required(mut self, required: bool) -> Self {
        self.user_verification_required = required;
        self
    }

    pub fn with_user_presence_required(mut self, required: bool) -> Self {
        self.user_presence_required = required;
        self
    }

    pub fn server_property(&self) -> &ServerProperty {
        &self.server_property
    }

    pub fn pub_key_cred_params(&self) -> Option<&[PublicKeyCredentialParameters]> {
        self.pub_key_cred_params.as_deref()
    }

    pub fn user_verification_required(&self) -> bool {
        self.user_verification_required
    }

    pub fn user_presence_required(&self) -> bool {
        self.user_presence_required
    }
}

/// Authentication policy, including the stored credential being asserted.
///
/// Defaults: any credential id accepted, user verification not required, user presence
/// required.
#[derive(Debug, Clone)]
pub struct AuthenticationParameters {
    server_property: ServerProperty,
    credential_record: CoreCredentialRecord,
    allow_credentials: Option<Vec<Vec<u8>>>,
    user_verification_required: bool,
    user_presence_required: bool,
}

impl AuthenticationParameters {
    pub fn new(server_property: ServerProperty, credential_record: CoreCredentialRecord) -> Self {
        Self {
            server_property,
            credential_record,
            allow_credentials: None,
            user_verification_required: false,
            user_presence_required: true,
        }
    }

    /// Only accept assertions for these credential ids.
    pub fn with_allow_credentials<I, B>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.allow_credentials = Some(ids.into_iter().map(|id| id.as_ref().to_vec()).collect());
        self
    }

    pub fn with_user_verification_required(mut self, required: bool) -> Self {
        self.user_verification_required = required;
        self
    }

    pub fn with_user_presence_required(mut self, required: bool) -> Self {
        self.user_presence_required = required;
        self
    }

    pub fn server_property(&self) -> &ServerProperty {
        &self.server_property
    }

    pub fn credential_record(&self) -> &CoreCredentialRecord {
        &self.credential_record
    }

    pub fn allow_credentials(&self) -> Option<&[Vec<u8>]> {
        self.allow_credentials.as_deref()
    }

    pub fn user_verification_required(&self) -> bool {
        self.user_verification_required
    }

    pub fn user_presence_required(&self) -> bool {
        self.user_presence_required
    }
}
