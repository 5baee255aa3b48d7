//! Android Keystore `KeyDescription` extension (OID 1.3.6.1.4.1.11129.2.1.17).
//!
//! ```text
//! KeyDescription ::= SEQUENCE {
//!     attestationVersion         INTEGER,
//!     attestationSecurityLevel   SecurityLevel,
//!     keymasterVersion           INTEGER,
//!     keymasterSecurityLevel     SecurityLevel,
//!     attestationChallenge       OCTET_STRING,
//!     uniqueId                   OCTET_STRING,
//!     softwareEnforced           AuthorizationList,
//!     teeEnforced                AuthorizationList,
//! }
//! ```
//!
//! Only the authorization-list members relevant to WebAuthn are decoded; the
//! rest are skipped.

use der_parser::ber::{BerObject, BerObjectContent};
use der_parser::der::parse_der;

pub const KEY_DESCRIPTION_OID: &str = "1.3.6.1.4.1.11129.2.1.17";

const TAG_PURPOSE: u32 = 1;
const TAG_ALL_APPLICATIONS: u32 = 600;
const TAG_ORIGIN: u32 = 702;

pub const KM_ORIGIN_GENERATED: u32 = 0;
pub const KM_PURPOSE_SIGN: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    Software,
    TrustedEnvironment,
    StrongBox,
    Unknown(u32),
}

impl From<u32> for SecurityLevel {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Software,
            1 => Self::TrustedEnvironment,
            2 => Self::StrongBox,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationList {
    pub purpose: Vec<u32>,
    pub origin: Option<u32>,
    pub all_applications: bool,
}

impl AuthorizationList {
    fn parse(object: &BerObject<'_>) -> Result<Self, String> {
        let members = object
            .as_sequence()
            .map_err(|_| "AuthorizationList is not a SEQUENCE".to_string())?;

        let mut list = Self::default();
        for member in members {
            // Every member is an EXPLICIT context tag around the actual value.
            let BerObjectContent::Unknown(any) = &member.content else {
                continue;
            };
            let inner: &[u8] = &any.data;
            match member.header.tag().0 {
                TAG_PURPOSE => {
                    let (_, set) = parse_der(inner).map_err(|e| format!("purpose: {e}"))?;
                    let values = set
                        .as_set()
                        .map_err(|_| "purpose is not a SET".to_string())?;
                    for value in values {
                        list.purpose.push(
                            value
                                .as_u32()
                                .map_err(|_| "purpose is not an INTEGER".to_string())?,
                        );
                    }
                }
                TAG_ORIGIN => {
                    let (_, origin) = parse_der(inner).map_err(|e| format!("origin: {e}"))?;
                    list.origin = Some(
                        origin
                            .as_u32()
                            .map_err(|_| "origin is not an INTEGER".to_string())?,
                    );
                }
                TAG_ALL_APPLICATIONS => list.all_applications = true,
                _ => {}
            }
        }
        Ok(list)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescription {
    pub attestation_version: u32,
    pub attestation_security_level: SecurityLevel,
    pub keymaster_version: u32,
    pub keymaster_security_level: SecurityLevel,
    pub attestation_challenge: Vec<u8>,
    pub software_enforced: AuthorizationList,
    pub tee_enforced: AuthorizationList,
}

impl KeyDescription {
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let (rest, object) = parse_der(bytes).map_err(|e| format!("undecodable: {e}"))?;
        if !rest.is_empty() {
            return Err("trailing bytes".into());
        }
        let fields = object
            .as_sequence()
            .map_err(|_| "KeyDescription is not a SEQUENCE".to_string())?;
        if fields.len() < 8 {
            return Err(format!("expected 8 fields, found {}", fields.len()));
        }

        let int = |i: usize, name: &str| {
            fields[i]
                .as_u32()
                .map_err(|_| format!("{name} is not an integer"))
        };
        Ok(Self {
            attestation_version: int(0, "attestationVersion")?,
            attestation_security_level: int(1, "attestationSecurityLevel")?.into(),
            keymaster_version: int(2, "keymasterVersion")?,
            keymaster_security_level: int(3, "keymasterSecurityLevel")?.into(),
            attestation_challenge: fields[4]
                .as_slice()
                .map_err(|_| "attestationChallenge is not an OCTET STRING".to_string())?
                .to_vec(),
            software_enforced: AuthorizationList::parse(&fields[6])?,
            tee_enforced: AuthorizationList::parse(&fields[7])?,
        })
    }
}
