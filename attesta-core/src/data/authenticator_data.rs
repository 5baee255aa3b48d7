//! The packed authenticator-data structure.
//!
//! ```text
//! rpIdHash(32) | flags(1) | signCount(4, BE)
//!   [ aaguid(16) | credentialIdLength(2, BE) | credentialId | COSE key ]   if AT
//!   [ CBOR extension map ]                                                if ED
//! ```

use std::fmt;

use ciborium::value::Value;

use super::cose::CoseKey;
use super::extensions::AuthenticatorExtensionOutputs;
use crate::error::{ConversionResult, DataConversionError};

/// Minimum length: rpIdHash + flags + signCount.
pub const MIN_AUTHENTICATOR_DATA_LEN: usize = 37;

/// Longest credential id a relying party must accept.
pub const MAX_CREDENTIAL_ID_LEN: usize = 1023;

/// The flags byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthenticatorFlags(u8);

impl AuthenticatorFlags {
    pub const USER_PRESENT: u8 = 0x01;
    pub const USER_VERIFIED: u8 = 0x04;
    pub const BACKUP_ELIGIBLE: u8 = 0x08;
    pub const BACKUP_STATE: u8 = 0x10;
    pub const ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
    pub const EXTENSION_DATA: u8 = 0x80;

    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn user_present(self) -> bool {
        self.0 & Self::USER_PRESENT != 0
    }

    pub fn user_verified(self) -> bool {
        self.0 & Self::USER_VERIFIED != 0
    }

    pub fn backup_eligible(self) -> bool {
        self.0 & Self::BACKUP_ELIGIBLE != 0
    }

    pub fn backup_state(self) -> bool {
        self.0 & Self::BACKUP_STATE != 0
    }

    pub fn attested_credential_data(self) -> bool {
        self.0 & Self::ATTESTED_CREDENTIAL_DATA != 0
    }

    pub fn extension_data(self) -> bool {
        self.0 & Self::EXTENSION_DATA != 0
    }
}

impl fmt::Debug for AuthenticatorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.user_present(), "UP"),
            (self.user_verified(), "UV"),
            (self.backup_eligible(), "BE"),
            (self.backup_state(), "BS"),
            (self.attested_credential_data(), "AT"),
            (self.extension_data(), "ED"),
        ];
        let set: Vec<&str> = names.iter().filter(|(on, _)| *on).map(|(_, n)| *n).collect();
        write!(f, "{:#04x} [{}]", self.0, set.join("|"))
    }
}

/// Authenticator Attestation GUID.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Aaguid([u8; 16]);

impl Aaguid {
    /// The all-zero AAGUID used by U2F authenticators and privacy-preserving ones.
    pub const ZERO: Aaguid = Aaguid([0; 16]);

    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 16]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 16]
    }
}

impl fmt::Display for Aaguid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_bytes(self.0).hyphenated())
    }
}

impl fmt::Debug for Aaguid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aaguid({self})")
    }
}

impl std::str::FromStr for Aaguid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(*uuid::Uuid::parse_str(s)?.as_bytes()))
    }
}

/// Credential data attached to a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    aaguid: Aaguid,
    credential_id: Vec<u8>,
    credential_public_key: CoseKey,
}

impl AttestedCredentialData {
    pub fn new(aaguid: Aaguid, credential_id: &[u8], credential_public_key: CoseKey) -> Self {
        Self {
            aaguid,
            credential_id: credential_id.to_vec(),
            credential_public_key,
        }
    }

    pub fn aaguid(&self) -> Aaguid {
        self.aaguid
    }

    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    pub fn credential_public_key(&self) -> &CoseKey {
        &self.credential_public_key
    }

    /// Decode from the start of `bytes`; returns the data and the bytes consumed.
    fn read_prefix(bytes: &[u8]) -> ConversionResult<(Self, usize)> {
        if bytes.len() < 18 {
            return Err(DataConversionError::AuthenticatorData(
                "attested credential data truncated".into(),
            ));
        }
        let aaguid = Aaguid::from_slice(&bytes[..16]).unwrap_or_default();
        let id_len = u16::from_be_bytes([bytes[16], bytes[17]]) as usize;
        let key_start = 18 + id_len;
        if bytes.len() < key_start {
            return Err(DataConversionError::AuthenticatorData(format!(
                "credential id length {id_len} exceeds remaining data"
            )));
        }
        let credential_id = bytes[18..key_start].to_vec();
        let (credential_public_key, key_len) = CoseKey::read_prefix(&bytes[key_start..])?;

        Ok((
            Self {
                aaguid,
                credential_id,
                credential_public_key,
            },
            key_start + key_len,
        ))
    }
}

/// Parsed authenticator data.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    rp_id_hash: [u8; 32],
    flags: AuthenticatorFlags,
    sign_count: u32,
    attested_credential_data: Option<AttestedCredentialData>,
    extensions: Option<AuthenticatorExtensionOutputs>,
}

impl AuthenticatorData {
    /// Strictly decode authenticator data. Trailing bytes are rejected.
    pub fn parse(bytes: &[u8]) -> ConversionResult<Self> {
        if bytes.len() < MIN_AUTHENTICATOR_DATA_LEN {
            return Err(DataConversionError::AuthenticatorData(format!(
                "expected at least {MIN_AUTHENTICATOR_DATA_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&bytes[..32]);
        let flags = AuthenticatorFlags(bytes[32]);
        let sign_count = u32::from_be_bytes([bytes[33], bytes[34], bytes[35], bytes[36]]);

        let mut pos = MIN_AUTHENTICATOR_DATA_LEN;

        let attested_credential_data = if flags.attested_credential_data() {
            let (data, consumed) = AttestedCredentialData::read_prefix(&bytes[pos..])?;
            pos += consumed;
            Some(data)
        } else {
            None
        };

        let extensions = if flags.extension_data() {
            let rest = &bytes[pos..];
            let mut reader = rest;
            let value: Value = ciborium::de::from_reader(&mut reader).map_err(|e| {
                DataConversionError::AuthenticatorData(format!("extensions: {e}"))
            })?;
            pos += rest.len() - reader.len();
            Some(AuthenticatorExtensionOutputs::from_value(value)?)
        } else {
            None
        };

        if pos != bytes.len() {
            return Err(DataConversionError::AuthenticatorData(format!(
                "{} unexpected trailing bytes",
                bytes.len() - pos
            )));
        }

        Ok(Self {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential_data,
            extensions,
        })
    }

    pub fn rp_id_hash(&self) -> &[u8; 32] {
        &self.rp_id_hash
    }

    pub fn flags(&self) -> AuthenticatorFlags {
        self.flags
    }

    pub fn sign_count(&self) -> u32 {
        self.sign_count
    }

    pub fn attested_credential_data(&self) -> Option<&AttestedCredentialData> {
        self.attested_credential_data.as_ref()
    }

    pub fn extensions(&self) -> Option<&AuthenticatorExtensionOutputs> {
        self.extensions.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cose::{CoseAlgorithm, CoseCurve, CoseKeyParams};

    fn sample_key() -> CoseKey {
        CoseKey::new(
            CoseAlgorithm::EdDSA,
            CoseKeyParams::Okp {
                curve: CoseCurve::Ed25519,
                x: vec![7; 32],
            },
        )
        .unwrap()
    }

    fn header(flags: u8, count: u32) -> Vec<u8> {
        let mut bytes = vec![0xab; 32];
        bytes.push(flags);
        bytes.extend_from_slice(&count.to_be_bytes());
        bytes
    }

    #[test]
    fn test_parse_minimal_assertion_data() {
        let bytes = header(AuthenticatorFlags::USER_PRESENT, 42);
        let data = AuthenticatorData::parse(&bytes).expect("Failed to parse");

        assert_eq!(data.rp_id_hash(), &[0xab; 32]);
        assert!(data.flags().user_present());
        assert!(!data.flags().user_verified());
        assert_eq!(data.sign_count(), 42);
        assert!(data.attested_credential_data().is_none());
    }

    #[test]
    fn test_parse_attested_credential_data() {
        let key = sample_key();
        let mut bytes = header(0x45, 0);
        bytes.extend_from_slice(&[0x11; 16]);
        bytes.extend_from_slice(&3u16.to_be_bytes());
        bytes.extend_from_slice(&[1, 2, 3]);
        bytes.extend_from_slice(key.as_bytes());

        let data = AuthenticatorData::parse(&bytes).expect("Failed to parse");
        let attested = data.attested_credential_data().expect("missing AT data");
        assert_eq!(attested.aaguid(), Aaguid::new([0x11; 16]));
        assert_eq!(attested.credential_id(), &[1, 2, 3]);
        assert_eq!(attested.credential_public_key(), &key);
    }

    #[test]
    fn test_parse_extension_map() {
        let mut bytes = header(0x81, 1);
        let ext = Value::Map(vec![(Value::Text("credProtect".into()), Value::Integer(1.into()))]);
        ciborium::ser::into_writer(&ext, &mut bytes).unwrap();

        let data = AuthenticatorData::parse(&bytes).expect("Failed to parse");
        assert_eq!(data.extensions().and_then(|e| e.cred_protect()), Some(1));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = header(0x01, 0);
        bytes.push(0x00);
        assert!(AuthenticatorData::parse(&bytes).is_err());
    }

    #[test]
    fn test_truncated_input_rejected() {
        assert!(AuthenticatorData::parse(&[0u8; 36]).is_err());

        let mut bytes = header(0x41, 0);
        bytes.extend_from_slice(&[0x11; 16]);
        bytes.extend_from_slice(&200u16.to_be_bytes());
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(AuthenticatorData::parse(&bytes).is_err());
    }

    #[test]
    fn test_flags_debug_lists_set_bits() {
        let flags = AuthenticatorFlags::new(0x45);
        assert_eq!(format!("{flags:?}"), "0x45 [UP|UV|AT]");
    }

    #[test]
    fn test_aaguid_display() {
        let aaguid: Aaguid = "adce0002-35bc-c60a-648b-0b25f1f05503".parse().unwrap();
        assert_eq!(aaguid.to_string(), "adce0002-35bc-c60a-648b-0b25f1f05503");
        assert!(!aaguid.is_zero());
        assert!(Aaguid::ZERO.is_zero());
    }
}
