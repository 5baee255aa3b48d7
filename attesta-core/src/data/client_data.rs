//! `CollectedClientData`: the JSON the client signs over.

use serde::Deserialize;

use crate::codec::base64url;
use crate::error::{ConversionResult, DataConversionError};

/// Ceremony markers carried in the `type` member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientDataType {
    Create,
    Get,
}

impl ClientDataType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "webauthn.create",
            Self::Get => "webauthn.get",
        }
    }
}

/// Token binding status reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenBindingStatus {
    Present,
    Supported,
    NotSupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBinding {
    status: TokenBindingStatus,
    id: Option<Vec<u8>>,
}

impl TokenBinding {
    pub fn status(&self) -> TokenBindingStatus {
        self.status
    }

    pub fn id(&self) -> Option<&[u8]> {
        self.id.as_deref()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClientData {
    #[serde(rename = "type")]
    ceremony_type: String,
    challenge: String,
    origin: String,
    #[serde(default)]
    cross_origin: Option<bool>,
    #[serde(default)]
    top_origin: Option<String>,
    #[serde(default)]
    token_binding: Option<RawTokenBinding>,
}

#[derive(Deserialize)]
struct RawTokenBinding {
    status: TokenBindingStatus,
    #[serde(default)]
    id: Option<String>,
}

/// Parsed client data. The `type` is kept verbatim so that unknown markers reach the
/// type check instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedClientData {
    ceremony_type: String,
    challenge: Vec<u8>,
    origin: String,
    cross_origin: Option<bool>,
    top_origin: Option<String>,
    token_binding: Option<TokenBinding>,
}

impl CollectedClientData {
    /// Decode `clientDataJSON` bytes.
    pub fn parse(bytes: &[u8]) -> ConversionResult<Self> {
        let raw: RawClientData = serde_json::from_slice(bytes)
            .map_err(|e| DataConversionError::ClientData(e.to_string()))?;

        let challenge = base64url::decode(&raw.challenge)
            .map_err(|e| DataConversionError::ClientData(format!("challenge: {e}")))?;

        let token_binding = raw
            .token_binding
            .map(|tb| -> ConversionResult<TokenBinding> {
                Ok(TokenBinding {
                    status: tb.status,
                    id: tb.id.as_deref().map(base64url::decode).transpose()?,
                })
            })
            .transpose()?;

        Ok(Self {
            ceremony_type: raw.ceremony_type,
            challenge,
            origin: raw.origin,
            cross_origin: raw.cross_origin,
            top_origin: raw.top_origin,
            token_binding,
        })
    }

    /// The raw `type` member.
    pub fn ceremony_type(&self) -> &str {
        &self.ceremony_type
    }

    pub fn is_type(&self, expected: ClientDataType) -> bool {
        self.ceremony_type == expected.as_str()
    }

    pub fn challenge(&self) -> &[u8] {
        &self.challenge
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn cross_origin(&self) -> bool {
        self.cross_origin.unwrap_or(false)
    }

    pub fn top_origin(&self) -> Option<&str> {
        self.top_origin.as_deref()
    }

    pub fn token_binding(&self) -> Option<&TokenBinding> {
        self.token_binding.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_client_data() {
        let json = br#"{"type":"webauthn.create","challenge":"AAECAw","origin":"https://example.com","crossOrigin":false}"#;
        let data = CollectedClientData::parse(json).expect("Failed to parse client data");

        assert!(data.is_type(ClientDataType::Create));
        assert!(!data.is_type(ClientDataType::Get));
        assert_eq!(data.challenge(), &[0, 1, 2, 3]);
        assert_eq!(data.origin(), "https://example.com");
        assert!(!data.cross_origin());
        assert!(data.token_binding().is_none());
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let json = br#"{"type":"payment.get","challenge":"AA","origin":"https://example.com"}"#;
        let data = CollectedClientData::parse(json).expect("Failed to parse client data");
        assert_eq!(data.ceremony_type(), "payment.get");
    }

    #[test]
    fn test_token_binding_parsed() {
        let json = br#"{"type":"webauthn.get","challenge":"AA","origin":"https://example.com","tokenBinding":{"status":"present","id":"AQI"}}"#;
        let data = CollectedClientData::parse(json).expect("Failed to parse client data");
        let tb = data.token_binding().expect("missing token binding");
        assert_eq!(tb.status(), TokenBindingStatus::Present);
        assert_eq!(tb.id(), Some(&[1u8, 2][..]));
    }

    #[test]
    fn test_missing_origin_is_conversion_error() {
        let json = br#"{"type":"webauthn.get","challenge":"AA"}"#;
        assert!(matches!(
            CollectedClientData::parse(json),
            Err(DataConversionError::ClientData(_))
        ));
    }
}
