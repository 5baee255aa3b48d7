//! COSE public keys as carried in attested credential data.
//!
//! Keys are CBOR maps keyed by integer labels: `1` key type, `3` algorithm, and
//! `-1`/`-2`/`-3` for the curve and coordinates (or modulus and exponent for RSA).

use std::fmt;

use ciborium::value::{Integer, Value};
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, PKeyRef, Public};
use openssl::rsa::Rsa;
use serde::{Deserialize, Serialize};

use crate::error::{ConversionResult, DataConversionError};

// COSE key labels
const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
const LABEL_CRV_OR_N: i64 = -1;
const LABEL_X_OR_E: i64 = -2;
const LABEL_Y: i64 = -3;

// COSE key types
const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const KTY_RSA: i64 = 3;

/// COSE algorithm identifiers accepted for credential and attestation signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum CoseAlgorithm {
    ES256,
    ES384,
    ES512,
    EdDSA,
    RS256,
    RS384,
    RS512,
    PS256,
    PS384,
    PS512,
    /// RSASSA-PKCS1-v1_5 with SHA-1, still emitted by some TPMs.
    RS1,
}

impl CoseAlgorithm {
    /// Parse a registered COSE algorithm value.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            -7 => Some(Self::ES256),
            -35 => Some(Self::ES384),
            -36 => Some(Self::ES512),
            -8 => Some(Self::EdDSA),
            -257 => Some(Self::RS256),
            -258 => Some(Self::RS384),
            -259 => Some(Self::RS512),
            -37 => Some(Self::PS256),
            -38 => Some(Self::PS384),
            -39 => Some(Self::PS512),
            -65535 => Some(Self::RS1),
            _ => None,
        }
    }

    /// The registered COSE value.
    pub fn value(self) -> i64 {
        match self {
            Self::ES256 => -7,
            Self::ES384 => -35,
            Self::ES512 => -36,
            Self::EdDSA => -8,
            Self::RS256 => -257,
            Self::RS384 => -258,
            Self::RS512 => -259,
            Self::PS256 => -37,
            Self::PS384 => -38,
            Self::PS512 => -39,
            Self::RS1 => -65535,
        }
    }

    /// Digest used by the signature scheme. `None` for EdDSA.
    pub fn message_digest(self) -> Option<MessageDigest> {
        match self {
            Self::ES256 | Self::RS256 | Self::PS256 => Some(MessageDigest::sha256()),
            Self::ES384 | Self::RS384 | Self::PS384 => Some(MessageDigest::sha384()),
            Self::ES512 | Self::RS512 | Self::PS512 => Some(MessageDigest::sha512()),
            Self::RS1 => Some(MessageDigest::sha1()),
            Self::EdDSA => None,
        }
    }

    pub fn is_pss(self) -> bool {
        matches!(self, Self::PS256 | Self::PS384 | Self::PS512)
    }

    pub fn is_rsa(self) -> bool {
        matches!(
            self,
            Self::RS256
                | Self::RS384
                | Self::RS512
                | Self::PS256
                | Self::PS384
                | Self::PS512
                | Self::RS1
        )
    }

    /// JOSE-style name, used for display and the CLI.
    pub fn name(self) -> &'static str {
        match self {
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
            Self::EdDSA => "EdDSA",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
            Self::RS1 => "RS1",
        }
    }

    /// Inverse of [`CoseAlgorithm::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::ES256,
            Self::ES384,
            Self::ES512,
            Self::EdDSA,
            Self::RS256,
            Self::RS384,
            Self::RS512,
            Self::PS256,
            Self::PS384,
            Self::PS512,
            Self::RS1,
        ]
        .into_iter()
        .find(|alg| alg.name().eq_ignore_ascii_case(name))
    }
}

impl TryFrom<i64> for CoseAlgorithm {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_i64(value).ok_or_else(|| format!("unsupported COSE algorithm {value}"))
    }
}

impl From<CoseAlgorithm> for i64 {
    fn from(alg: CoseAlgorithm) -> Self {
        alg.value()
    }
}

impl fmt::Display for CoseAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.value())
    }
}

/// Elliptic curves named by COSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoseCurve {
    P256,
    P384,
    P521,
    Ed25519,
}

impl CoseCurve {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::P256),
            2 => Some(Self::P384),
            3 => Some(Self::P521),
            6 => Some(Self::Ed25519),
            _ => None,
        }
    }

    pub fn value(self) -> i64 {
        match self {
            Self::P256 => 1,
            Self::P384 => 2,
            Self::P521 => 3,
            Self::Ed25519 => 6,
        }
    }

    /// Byte length of one coordinate.
    pub fn coordinate_len(self) -> usize {
        match self {
            Self::P256 | Self::Ed25519 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    fn nid(self) -> Option<Nid> {
        match self {
            Self::P256 => Some(Nid::X9_62_PRIME256V1),
            Self::P384 => Some(Nid::SECP384R1),
            Self::P521 => Some(Nid::SECP521R1),
            Self::Ed25519 => None,
        }
    }

    fn from_nid(nid: Nid) -> Option<Self> {
        match nid {
            Nid::X9_62_PRIME256V1 => Some(Self::P256),
            Nid::SECP384R1 => Some(Self::P384),
            Nid::SECP521R1 => Some(Self::P521),
            _ => None,
        }
    }
}

/// Key material, independent of the algorithm it is used with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoseKeyParams {
    Ec2 {
        curve: CoseCurve,
        x: Vec<u8>,
        y: Vec<u8>,
    },
    Okp {
        curve: CoseCurve,
        x: Vec<u8>,
    },
    Rsa {
        n: Vec<u8>,
        e: Vec<u8>,
    },
}

impl CoseKeyParams {
    /// Extract key material from an OpenSSL public key (e.g. a certificate's SPKI).
    pub fn from_pkey(key: &PKeyRef<Public>) -> Result<Option<Self>, ErrorStack> {
        match key.id() {
            Id::EC => {
                let ec = key.ec_key()?;
                let group = ec.group();
                let Some(curve) = group.curve_name().and_then(CoseCurve::from_nid) else {
                    return Ok(None);
                };
                let mut ctx = BigNumContext::new()?;
                let mut x = BigNum::new()?;
                let mut y = BigNum::new()?;
                ec.public_key()
                    .affine_coordinates(group, &mut x, &mut y, &mut ctx)?;
                let len = curve.coordinate_len() as i32;
                Ok(Some(Self::Ec2 {
                    curve,
                    x: x.to_vec_padded(len)?,
                    y: y.to_vec_padded(len)?,
                }))
            }
            Id::RSA => {
                let rsa = key.rsa()?;
                Ok(Some(Self::Rsa {
                    n: rsa.n().to_vec(),
                    e: rsa.e().to_vec(),
                }))
            }
            Id::ED25519 => Ok(Some(Self::Okp {
                curve: CoseCurve::Ed25519,
                x: key.raw_public_key()?,
            })),
            _ => Ok(None),
        }
    }

    /// Compare key material, ignoring leading zero bytes in RSA integers.
    pub fn same_key(&self, other: &CoseKeyParams) -> bool {
        match (self, other) {
            (Self::Rsa { n: n1, e: e1 }, Self::Rsa { n: n2, e: e2 }) => {
                strip_leading_zeros(n1) == strip_leading_zeros(n2)
                    && strip_leading_zeros(e1) == strip_leading_zeros(e2)
            }
            _ => self == other,
        }
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// A credential public key together with the exact bytes it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseKey {
    alg: CoseAlgorithm,
    params: CoseKeyParams,
    encoded: Vec<u8>,
}

impl CoseKey {
    /// Build a key from its parts, producing its canonical CBOR encoding.
    pub fn new(alg: CoseAlgorithm, params: CoseKeyParams) -> ConversionResult<Self> {
        check_alg_matches_params(alg, &params)?;
        let value = encode_value(alg, &params);
        let mut encoded = Vec::new();
        ciborium::ser::into_writer(&value, &mut encoded)
            .map_err(|e| DataConversionError::Cbor(e.to_string()))?;
        Ok(Self {
            alg,
            params,
            encoded,
        })
    }

    /// Decode a key that must occupy all of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> ConversionResult<Self> {
        let (key, consumed) = Self::read_prefix(bytes)?;
        if consumed != bytes.len() {
            return Err(DataConversionError::CoseKey(format!(
                "{} trailing bytes after key",
                bytes.len() - consumed
            )));
        }
        Ok(key)
    }

    /// Decode a key from the start of `bytes`, returning it and the bytes consumed.
    pub fn read_prefix(bytes: &[u8]) -> ConversionResult<(Self, usize)> {
        let mut reader = bytes;
        let value: Value = ciborium::de::from_reader(&mut reader)
            .map_err(|e| DataConversionError::CoseKey(e.to_string()))?;
        let consumed = bytes.len() - reader.len();
        let key = Self::from_value(&value, bytes[..consumed].to_vec())?;
        Ok((key, consumed))
    }

    fn from_value(value: &Value, encoded: Vec<u8>) -> ConversionResult<Self> {
        let map = value
            .as_map()
            .ok_or_else(|| DataConversionError::CoseKey("key is not a CBOR map".into()))?;

        let kty = int_label(map, LABEL_KTY)?
            .ok_or_else(|| DataConversionError::CoseKey("missing kty".into()))?;
        let alg_value = int_label(map, LABEL_ALG)?
            .ok_or_else(|| DataConversionError::CoseKey("missing alg".into()))?;
        let alg = CoseAlgorithm::from_i64(alg_value).ok_or_else(|| {
            DataConversionError::CoseKey(format!("unsupported algorithm {alg_value}"))
        })?;

        let params = match kty {
            KTY_EC2 => {
                let curve = curve_label(map)?;
                let x = bytes_label(map, LABEL_X_OR_E, "x")?;
                let y = bytes_label(map, LABEL_Y, "y")?;
                if x.len() != curve.coordinate_len() || y.len() != curve.coordinate_len() {
                    return Err(DataConversionError::CoseKey(
                        "coordinate length does not match curve".into(),
                    ));
                }
                CoseKeyParams::Ec2 { curve, x, y }
            }
            KTY_OKP => {
                let curve = curve_label(map)?;
                let x = bytes_label(map, LABEL_X_OR_E, "x")?;
                if x.len() != curve.coordinate_len() {
                    return Err(DataConversionError::CoseKey(
                        "OKP key length does not match curve".into(),
                    ));
                }
                CoseKeyParams::Okp { curve, x }
            }
            KTY_RSA => CoseKeyParams::Rsa {
                n: bytes_label(map, LABEL_CRV_OR_N, "n")?,
                e: bytes_label(map, LABEL_X_OR_E, "e")?,
            },
            other => {
                return Err(DataConversionError::CoseKey(format!(
                    "unsupported key type {other}"
                )))
            }
        };

        check_alg_matches_params(alg, &params)?;

        Ok(Self {
            alg,
            params,
            encoded,
        })
    }

    pub fn algorithm(&self) -> CoseAlgorithm {
        self.alg
    }

    pub fn params(&self) -> &CoseKeyParams {
        &self.params
    }

    /// The CBOR bytes this key was decoded from.
    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }

    /// Uncompressed ANSI X9.62 point (`0x04 || x || y`) for EC2 keys.
    pub fn to_uncompressed_point(&self) -> Option<Vec<u8>> {
        match &self.params {
            CoseKeyParams::Ec2 { x, y, .. } => {
                let mut point = Vec::with_capacity(1 + x.len() + y.len());
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                Some(point)
            }
            _ => None,
        }
    }

    /// Convert to an OpenSSL public key for signature verification.
    pub fn to_pkey(&self) -> Result<PKey<Public>, ErrorStack> {
        match &self.params {
            CoseKeyParams::Ec2 { curve, x, y } => {
                // Ed25519 never reaches here; params are checked against alg on construction.
                let nid = curve.nid().unwrap_or(Nid::X9_62_PRIME256V1);
                let group = EcGroup::from_curve_name(nid)?;
                let x = BigNum::from_slice(x)?;
                let y = BigNum::from_slice(y)?;
                let ec = EcKey::from_public_key_affine_coordinates(&group, &x, &y)?;
                PKey::from_ec_key(ec)
            }
            CoseKeyParams::Okp { x, .. } => PKey::public_key_from_raw_bytes(x, Id::ED25519),
            CoseKeyParams::Rsa { n, e } => {
                let rsa = Rsa::from_public_components(BigNum::from_slice(n)?, BigNum::from_slice(e)?)?;
                PKey::from_rsa(rsa)
            }
        }
    }
}

fn check_alg_matches_params(alg: CoseAlgorithm, params: &CoseKeyParams) -> ConversionResult<()> {
    let ok = match params {
        CoseKeyParams::Ec2 { curve, .. } => matches!(
            (alg, curve),
            (CoseAlgorithm::ES256, CoseCurve::P256)
                | (CoseAlgorithm::ES384, CoseCurve::P384)
                | (CoseAlgorithm::ES512, CoseCurve::P521)
        ),
        CoseKeyParams::Okp { curve, .. } => {
            alg == CoseAlgorithm::EdDSA && *curve == CoseCurve::Ed25519
        }
        CoseKeyParams::Rsa { .. } => alg.is_rsa(),
    };
    if ok {
        Ok(())
    } else {
        Err(DataConversionError::CoseKey(format!(
            "algorithm {alg} does not fit the key parameters"
        )))
    }
}

fn encode_value(alg: CoseAlgorithm, params: &CoseKeyParams) -> Value {
    let int = |v: i64| Value::Integer(Integer::from(v));
    let mut map = vec![];
    match params {
        CoseKeyParams::Ec2 { curve, x, y } => {
            map.push((int(LABEL_KTY), int(KTY_EC2)));
            map.push((int(LABEL_ALG), int(alg.value())));
            map.push((int(LABEL_CRV_OR_N), int(curve.value())));
            map.push((int(LABEL_X_OR_E), Value::Bytes(x.clone())));
            map.push((int(LABEL_Y), Value::Bytes(y.clone())));
        }
        CoseKeyParams::Okp { curve, x } => {
            map.push((int(LABEL_KTY), int(KTY_OKP)));
            map.push((int(LABEL_ALG), int(alg.value())));
            map.push((int(LABEL_CRV_OR_N), int(curve.value())));
            map.push((int(LABEL_X_OR_E), Value::Bytes(x.clone())));
        }
        CoseKeyParams::Rsa { n, e } => {
            map.push((int(LABEL_KTY), int(KTY_RSA)));
            map.push((int(LABEL_ALG), int(alg.value())));
            map.push((int(LABEL_CRV_OR_N), Value::Bytes(n.clone())));
            map.push((int(LABEL_X_OR_E), Value::Bytes(e.clone())));
        }
    }
    Value::Map(map)
}

fn label<'a>(map: &'a [(Value, Value)], label: i64) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(label)))
        .map(|(_, v)| v)
}

fn int_label(map: &[(Value, Value)], key: i64) -> ConversionResult<Option<i64>> {
    match label(map, key) {
        None => Ok(None),
        Some(Value::Integer(i)) => i64::try_from(i128::from(*i))
            .map(Some)
            .map_err(|_| DataConversionError::CoseKey(format!("label {key} out of range"))),
        Some(_) => Err(DataConversionError::CoseKey(format!(
            "label {key} is not an integer"
        ))),
    }
}

fn bytes_label(map: &[(Value, Value)], key: i64, name: &str) -> ConversionResult<Vec<u8>> {
    match label(map, key) {
        Some(Value::Bytes(b)) => Ok(b.clone()),
        Some(_) => Err(DataConversionError::CoseKey(format!(
            "{name} is not a byte string"
        ))),
        None => Err(DataConversionError::CoseKey(format!("missing {name}"))),
    }
}

fn curve_label(map: &[(Value, Value)]) -> ConversionResult<CoseCurve> {
    let crv = int_label(map, LABEL_CRV_OR_N)?
        .ok_or_else(|| DataConversionError::CoseKey("missing crv".into()))?;
    CoseCurve::from_i64(crv)
        .ok_or_else(|| DataConversionError::CoseKey(format!("unsupported curve {crv}")))
}
