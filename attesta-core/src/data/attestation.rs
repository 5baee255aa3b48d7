//! Attestation objects and their format-specific statements.

use std::fmt;

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use super::authenticator_data::AuthenticatorData;
use crate::error::{ConversionResult, DataConversionError};

/// The seven attestation statement formats, keyed by their `fmt` identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttestationFormat {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "fido-u2f")]
    FidoU2f,
    #[serde(rename = "packed")]
    Packed,
    #[serde(rename = "tpm")]
    Tpm,
    #[serde(rename = "android-key")]
    AndroidKey,
    #[serde(rename = "android-safetynet")]
    AndroidSafetyNet,
    #[serde(rename = "apple")]
    Apple,
}

impl AttestationFormat {
    pub const ALL: [AttestationFormat; 7] = [
        Self::None,
        Self::FidoU2f,
        Self::Packed,
        Self::Tpm,
        Self::AndroidKey,
        Self::AndroidSafetyNet,
        Self::Apple,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::FidoU2f => "fido-u2f",
            Self::Packed => "packed",
            Self::Tpm => "tpm",
            Self::AndroidKey => "android-key",
            Self::AndroidSafetyNet => "android-safetynet",
            Self::Apple => "apple",
        }
    }
}

impl fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttestationFormat {
    type Err = DataConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| DataConversionError::UnknownAttestationFormat(s.to_string()))
    }
}

/// `none`: the statement map must be empty; any member names are recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoneStatement {
    pub unexpected_members: Vec<String>,
}

/// `fido-u2f`: `{ sig, x5c }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FidoU2fStatement {
    pub sig: Option<Vec<u8>>,
    pub x5c: Option<Vec<Vec<u8>>>,
}

/// `packed`: `{ alg, sig, x5c? }` or the legacy `{ alg, sig, ecdaaKeyId }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedStatement {
    pub alg: Option<i64>,
    pub sig: Option<Vec<u8>>,
    pub x5c: Option<Vec<Vec<u8>>>,
    pub ecdaa_key_id: Option<Vec<u8>>,
}

/// `tpm`: `{ ver, alg, x5c, sig, certInfo, pubArea }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TpmStatement {
    pub ver: Option<String>,
    pub alg: Option<i64>,
    pub x5c: Option<Vec<Vec<u8>>>,
    pub sig: Option<Vec<u8>>,
    pub cert_info: Option<Vec<u8>>,
    pub pub_area: Option<Vec<u8>>,
}

/// `android-key`: `{ alg, sig, x5c }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AndroidKeyStatement {
    pub alg: Option<i64>,
    pub sig: Option<Vec<u8>>,
    pub x5c: Option<Vec<Vec<u8>>>,
}

/// `android-safetynet`: `{ ver, response }`, where `response` is a compact JWS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafetyNetStatement {
    pub ver: Option<String>,
    pub response: Option<Vec<u8>>,
}

/// `apple`: `{ x5c }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppleStatement {
    pub x5c: Option<Vec<Vec<u8>>>,
}

/// A format-specific attestation statement.
///
/// Members are optional here: presence is checked by each format's verifier so that a
/// missing member surfaces as a verification error, not a decoding one. Members with the
/// wrong CBOR type fail decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationStatement {
    None(NoneStatement),
    FidoU2f(FidoU2fStatement),
    Packed(PackedStatement),
    Tpm(TpmStatement),
    AndroidKey(AndroidKeyStatement),
    AndroidSafetyNet(SafetyNetStatement),
    Apple(AppleStatement),
}

impl AttestationStatement {
    pub fn format(&self) -> AttestationFormat {
        match self {
            Self::None(_) => AttestationFormat::None,
            Self::FidoU2f(_) => AttestationFormat::FidoU2f,
            Self::Packed(_) => AttestationFormat::Packed,
            Self::Tpm(_) => AttestationFormat::Tpm,
            Self::AndroidKey(_) => AttestationFormat::AndroidKey,
            Self::AndroidSafetyNet(_) => AttestationFormat::AndroidSafetyNet,
            Self::Apple(_) => AttestationFormat::Apple,
        }
    }

    /// Decode `attStmt` for the given format.
    pub fn from_cbor(format: AttestationFormat, value: &Value) -> ConversionResult<Self> {
        let map = StatementMap::new(value)?;
        let statement = match format {
            AttestationFormat::None => Self::None(NoneStatement {
                unexpected_members: map.member_names(),
            }),
            AttestationFormat::FidoU2f => Self::FidoU2f(FidoU2fStatement {
                sig: map.bytes("sig")?,
                x5c: map.certificates("x5c")?,
            }),
            AttestationFormat::Packed => Self::Packed(PackedStatement {
                alg: map.integer("alg")?,
                sig: map.bytes("sig")?,
                x5c: map.certificates("x5c")?,
                ecdaa_key_id: map.bytes("ecdaaKeyId")?,
            }),
            AttestationFormat::Tpm => Self::Tpm(TpmStatement {
                ver: map.text("ver")?,
                alg: map.integer("alg")?,
                x5c: map.certificates("x5c")?,
                sig: map.bytes("sig")?,
                cert_info: map.bytes("certInfo")?,
                pub_area: map.bytes("pubArea")?,
            }),
            AttestationFormat::AndroidKey => Self::AndroidKey(AndroidKeyStatement {
                alg: map.integer("alg")?,
                sig: map.bytes("sig")?,
                x5c: map.certificates("x5c")?,
            }),
            AttestationFormat::AndroidSafetyNet => Self::AndroidSafetyNet(SafetyNetStatement {
                ver: map.text("ver")?,
                response: map.bytes("response")?,
            }),
            AttestationFormat::Apple => Self::Apple(AppleStatement {
                x5c: map.certificates("x5c")?,
            }),
        };
        Ok(statement)
    }
}

struct StatementMap<'a>(&'a [(Value, Value)]);

impl<'a> StatementMap<'a> {
    fn new(value: &'a Value) -> ConversionResult<Self> {
        match value {
            Value::Map(map) => Ok(Self(map)),
            _ => Err(DataConversionError::AttestationObject(
                "attStmt is not a map".into(),
            )),
        }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.0
            .iter()
            .find(|(k, _)| k.as_text() == Some(name))
            .map(|(_, v)| v)
    }

    fn member_names(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|(k, _)| k.as_text().map_or_else(|| format!("{k:?}"), str::to_string))
            .collect()
    }

    fn wrong_type(name: &str, expected: &str) -> DataConversionError {
        DataConversionError::AttestationObject(format!("attStmt.{name} is not {expected}"))
    }

    fn bytes(&self, name: &str) -> ConversionResult<Option<Vec<u8>>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Bytes(b)) => Ok(Some(b.clone())),
            Some(_) => Err(Self::wrong_type(name, "a byte string")),
        }
    }

    fn text(&self, name: &str) -> ConversionResult<Option<String>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Text(t)) => Ok(Some(t.clone())),
            Some(_) => Err(Self::wrong_type(name, "a text string")),
        }
    }

    fn integer(&self, name: &str) -> ConversionResult<Option<i64>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Integer(i)) => i64::try_from(i128::from(*i))
                .map(Some)
                .map_err(|_| Self::wrong_type(name, "an i64")),
            Some(_) => Err(Self::wrong_type(name, "an integer")),
        }
    }

    fn certificates(&self, name: &str) -> ConversionResult<Option<Vec<Vec<u8>>>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::Bytes(b) => Ok(b.clone()),
                    _ => Err(Self::wrong_type(name, "an array of byte strings")),
                })
                .collect::<ConversionResult<Vec<_>>>()
                .map(Some),
            Some(_) => Err(Self::wrong_type(name, "an array")),
        }
    }
}

/// A decoded `attestationObject`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    statement: AttestationStatement,
    authenticator_data: AuthenticatorData,
    authenticator_data_bytes: Vec<u8>,
}

impl AttestationObject {
    /// Decode the CBOR `{ fmt, attStmt, authData }` map. Trailing bytes are rejected.
    pub fn parse(bytes: &[u8]) -> ConversionResult<Self> {
        let mut reader = bytes;
        let value: Value = ciborium::de::from_reader(&mut reader)
            .map_err(|e| DataConversionError::Cbor(e.to_string()))?;
        if !reader.is_empty() {
            return Err(DataConversionError::AttestationObject(format!(
                "{} trailing bytes",
                reader.len()
            )));
        }

        let map = value.as_map().ok_or_else(|| {
            DataConversionError::AttestationObject("attestation object is not a map".into())
        })?;
        let member = |name: &str| {
            map.iter()
                .find(|(k, _)| k.as_text() == Some(name))
                .map(|(_, v)| v)
                .ok_or_else(|| DataConversionError::AttestationObject(format!("missing {name}")))
        };

        let fmt = member("fmt")?
            .as_text()
            .ok_or_else(|| DataConversionError::AttestationObject("fmt is not text".into()))?;
        let format: AttestationFormat = fmt.parse()?;
        let statement = AttestationStatement::from_cbor(format, member("attStmt")?)?;

        let authenticator_data_bytes = member("authData")?
            .as_bytes()
            .ok_or_else(|| {
                DataConversionError::AttestationObject("authData is not a byte string".into())
            })?
            .clone();
        let authenticator_data = AuthenticatorData::parse(&authenticator_data_bytes)?;

        Ok(Self {
            statement,
            authenticator_data,
            authenticator_data_bytes,
        })
    }

    pub fn format(&self) -> AttestationFormat {
        self.statement.format()
    }

    pub fn statement(&self) -> &AttestationStatement {
        &self.statement
    }

    pub fn authenticator_data(&self) -> &AuthenticatorData {
        &self.authenticator_data
    }

    /// The exact `authData` bytes from the attestation object.
    pub fn authenticator_data_bytes(&self) -> &[u8] {
        &self.authenticator_data_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(value, &mut out).unwrap();
        out
    }

    fn auth_data() -> Vec<u8> {
        let mut bytes = vec![0u8; 32];
        bytes.push(0x01);
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes
    }

    fn object(fmt: &str, stmt: Value) -> Vec<u8> {
        encode(&Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text(fmt.into())),
            (Value::Text("attStmt".into()), stmt),
            (Value::Text("authData".into()), Value::Bytes(auth_data())),
        ]))
    }

    #[test]
    fn test_parse_none_attestation_object() {
        let bytes = object("none", Value::Map(vec![]));
        let parsed = AttestationObject::parse(&bytes).expect("Failed to parse");
        assert_eq!(parsed.format(), AttestationFormat::None);
        assert_eq!(parsed.authenticator_data_bytes(), auth_data().as_slice());
        assert!(matches!(
            parsed.statement(),
            AttestationStatement::None(NoneStatement { unexpected_members }) if unexpected_members.is_empty()
        ));
    }

    #[test]
    fn test_parse_packed_statement_members() {
        let stmt = Value::Map(vec![
            (Value::Text("alg".into()), Value::Integer((-7).into())),
            (Value::Text("sig".into()), Value::Bytes(vec![1, 2])),
            (
                Value::Text("x5c".into()),
                Value::Array(vec![Value::Bytes(vec![3])]),
            ),
        ]);
        let parsed = AttestationObject::parse(&object("packed", stmt)).expect("Failed to parse");
        let AttestationStatement::Packed(packed) = parsed.statement() else {
            panic!("expected packed statement");
        };
        assert_eq!(packed.alg, Some(-7));
        assert_eq!(packed.sig.as_deref(), Some(&[1u8, 2][..]));
        assert_eq!(packed.x5c.as_ref().map(Vec::len), Some(1));
        assert!(packed.ecdaa_key_id.is_none());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = AttestationObject::parse(&object("bogus", Value::Map(vec![]))).unwrap_err();
        assert!(matches!(err, DataConversionError::UnknownAttestationFormat(f) if f == "bogus"));
    }

    #[test]
    fn test_wrong_member_type_rejected() {
        let stmt = Value::Map(vec![(Value::Text("sig".into()), Value::Text("nope".into()))]);
        assert!(AttestationObject::parse(&object("fido-u2f", stmt)).is_err());
    }

    #[test]
    fn test_format_names_roundtrip() {
        for format in AttestationFormat::ALL {
            assert_eq!(format.as_str().parse::<AttestationFormat>().unwrap(), format);
        }
    }
}
