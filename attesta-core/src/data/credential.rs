//! The relying party's stored view of a credential.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::attestation::AttestationFormat;
use super::authenticator_data::AttestedCredentialData;
use super::ceremony::RegistrationData;

/// Transport hints reported at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthenticatorTransport {
    Usb,
    Nfc,
    Ble,
    SmartCard,
    Hybrid,
    Internal,
    /// A transport this crate does not know; kept so it can be echoed back to clients.
    Other(String),
}

impl AuthenticatorTransport {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Usb => "usb",
            Self::Nfc => "nfc",
            Self::Ble => "ble",
            Self::SmartCard => "smart-card",
            Self::Hybrid => "hybrid",
            Self::Internal => "internal",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for AuthenticatorTransport {
    fn from(s: String) -> Self {
        match s.as_str() {
            "usb" => Self::Usb,
            "nfc" => Self::Nfc,
            "ble" => Self::Ble,
            "smart-card" => Self::SmartCard,
            // "cable" is the pre-standard name for hybrid
            "hybrid" | "cable" => Self::Hybrid,
            "internal" => Self::Internal,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for AuthenticatorTransport {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<AuthenticatorTransport> for String {
    fn from(t: AuthenticatorTransport) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for AuthenticatorTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credential state owned by the relying party. Verification only reads it; after a
/// successful authentication the caller stores the presented counter with
/// [`CoreCredentialRecord::set_counter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreCredentialRecord {
    attested_credential_data: AttestedCredentialData,
    counter: u32,
    transports: BTreeSet<AuthenticatorTransport>,
    backup_eligible: Option<bool>,
    backup_state: Option<bool>,
    uv_initialized: Option<bool>,
    attestation_format: Option<AttestationFormat>,
}

impl CoreCredentialRecord {
    pub fn new(attested_credential_data: AttestedCredentialData, counter: u32) -> Self {
        Self {
            attested_credential_data,
            counter,
            transports: BTreeSet::new(),
            backup_eligible: None,
            backup_state: None,
            uv_initialized: None,
            attestation_format: None,
        }
    }

    /// The record to persist after a verified registration.
    pub fn from_registration(data: &RegistrationData) -> Option<Self> {
        let object = data.attestation_object();
        let auth_data = object.authenticator_data();
        let attested = auth_data.attested_credential_data()?.clone();
        let flags = auth_data.flags();
        Some(Self {
            attested_credential_data: attested,
            counter: auth_data.sign_count(),
            transports: data.transports().cloned().unwrap_or_default(),
            backup_eligible: Some(flags.backup_eligible()),
            backup_state: Some(flags.backup_state()),
            uv_initialized: Some(flags.user_verified()),
            attestation_format: Some(object.format()),
        })
    }

    pub fn with_transports(
        mut self,
        transports: impl IntoIterator<Item = AuthenticatorTransport>,
    ) -> Self {
        self.transports = transports.into_iter().collect();
        self
    }

    pub fn with_backup_flags(mut self, eligible: bool, state: bool) -> Self {
        self.backup_eligible = Some(eligible);
        self.backup_state = Some(state);
        self
    }

    pub fn with_uv_initialized(mut self, uv_initialized: bool) -> Self {
        self.uv_initialized = Some(uv_initialized);
        self
    }

    pub fn with_attestation_format(mut self, format: AttestationFormat) -> Self {
        self.attestation_format = Some(format);
        self
    }

    pub fn attested_credential_data(&self) -> &AttestedCredentialData {
        &self.attested_credential_data
    }

    pub fn credential_id(&self) -> &[u8] {
        self.attested_credential_data.credential_id()
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn set_counter(&mut self, counter: u32) {
        self.counter = counter;
    }

    pub fn transports(&self) -> &BTreeSet<AuthenticatorTransport> {
        &self.transports
    }

    /// `None` when the record predates backup flags.
    pub fn backup_eligible(&self) -> Option<bool> {
        self.backup_eligible
    }

    pub fn backup_state(&self) -> Option<bool> {
        self.backup_state
    }

    pub fn set_backup_state(&mut self, state: bool) {
        self.backup_state = Some(state);
    }

    pub fn uv_initialized(&self) -> Option<bool> {
        self.uv_initialized
    }

    pub fn set_uv_initialized(&mut self, uv_initialized: bool) {
        self.uv_initialized = Some(uv_initialized);
    }

    pub fn attestation_format(&self) -> Option<AttestationFormat> {
        self.attestation_format
    }
}
