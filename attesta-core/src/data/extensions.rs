//! Extension outputs reported by the client and by the authenticator.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::error::{ConversionResult, DataConversionError};

/// `clientExtensionResults` as serialized by the browser.
///
/// Common extensions are typed; anything else is kept verbatim in `other`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientExtensionOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appid: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_props: Option<CredentialPropertiesOutput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac_create_secret: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac_get_secret: Option<HmacGetSecretOutput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_blob: Option<LargeBlobOutput>,

    /// Unrecognized extensions, preserved as raw JSON.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl ClientExtensionOutputs {
    /// Parse the JSON string form used by raw requests. An empty string is no extensions.
    pub fn from_json(json: &str) -> ConversionResult<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// `credProps` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPropertiesOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rk: Option<bool>,
}

/// `largeBlob` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeBlobOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written: Option<bool>,
}

/// `hmacGetSecret` output: one or two HMAC results, base64url on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HmacGetSecretJson", into = "HmacGetSecretJson")]
pub struct HmacGetSecretOutput {
    output1: Vec<u8>,
    output2: Option<Vec<u8>>,
}

impl HmacGetSecretOutput {
    pub fn new(output1: &[u8], output2: Option<&[u8]>) -> Self {
        Self {
            output1: output1.to_vec(),
            output2: output2.map(<[u8]>::to_vec),
        }
    }

    pub fn output1(&self) -> &[u8] {
        &self.output1
    }

    pub fn output2(&self) -> Option<&[u8]> {
        self.output2.as_deref()
    }
}

#[derive(Serialize, Deserialize)]
struct HmacGetSecretJson {
    output1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output2: Option<String>,
}

impl TryFrom<HmacGetSecretJson> for HmacGetSecretOutput {
    type Error = base64::DecodeError;

    fn try_from(json: HmacGetSecretJson) -> Result<Self, Self::Error> {
        Ok(Self {
            output1: URL_SAFE_NO_PAD.decode(json.output1.trim_end_matches('='))?,
            output2: json
                .output2
                .map(|o| URL_SAFE_NO_PAD.decode(o.trim_end_matches('=')))
                .transpose()?,
        })
    }
}

impl From<HmacGetSecretOutput> for HmacGetSecretJson {
    fn from(out: HmacGetSecretOutput) -> Self {
        Self {
            output1: URL_SAFE_NO_PAD.encode(out.output1),
            output2: out.output2.map(|o| URL_SAFE_NO_PAD.encode(o)),
        }
    }
}

/// Authenticator extension outputs: the CBOR map following the ED flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthenticatorExtensionOutputs {
    entries: Vec<(String, Value)>,
}

impl AuthenticatorExtensionOutputs {
    pub(crate) fn from_value(value: Value) -> ConversionResult<Self> {
        let Value::Map(map) = value else {
            return Err(DataConversionError::AuthenticatorData(
                "extensions are not a CBOR map".into(),
            ));
        };
        let entries = map
            .into_iter()
            .map(|(k, v)| match k {
                Value::Text(name) => Ok((name, v)),
                _ => Err(DataConversionError::AuthenticatorData(
                    "extension identifier is not a text string".into(),
                )),
            })
            .collect::<ConversionResult<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `credProtect` policy level (1-3).
    pub fn cred_protect(&self) -> Option<u8> {
        match self.get("credProtect")? {
            Value::Integer(i) => u8::try_from(i128::from(*i)).ok(),
            _ => None,
        }
    }

    /// `hmac-secret` registration output.
    pub fn hmac_secret(&self) -> Option<bool> {
        self.get("hmac-secret")?.as_bool()
    }
}
