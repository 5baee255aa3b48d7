//! Relying-party expectations for a single ceremony.

use std::fmt;

use url::Url;

use crate::codec::base64url;
use crate::crypto;
use crate::error::{ConversionResult, DataConversionError};

const ANDROID_APK_KEY_HASH_PREFIX: &str = "android:apk-key-hash:";
const IOS_BUNDLE_ID_PREFIX: &str = "ios:bundle-id:";

/// An acceptable origin. Comparison with the client's origin is exact string equality:
/// case, scheme and port are never normalized.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Origin(String);

impl Origin {
    /// Validate and wrap an origin such as `https://example.com:8443`.
    ///
    /// Native-app origins (`android:apk-key-hash:...`, `ios:bundle-id:...`) are accepted
    /// as-is.
    pub fn new(origin: impl Into<String>) -> ConversionResult<Self> {
        let origin = origin.into();
        if origin.starts_with(ANDROID_APK_KEY_HASH_PREFIX)
            || origin.starts_with(IOS_BUNDLE_ID_PREFIX)
        {
            return Ok(Self(origin));
        }

        let url = Url::parse(&origin)
            .map_err(|e| DataConversionError::Origin(format!("{origin}: {e}")))?;
        if !matches!(url.scheme(), "https" | "http") || url.host().is_none() {
            return Err(DataConversionError::Origin(format!(
                "{origin}: expected an http(s) origin with a host"
            )));
        }
        if origin.ends_with('/')
            || url.path() != "/"
            || url.query().is_some()
            || url.fragment().is_some()
        {
            return Err(DataConversionError::Origin(format!(
                "{origin}: origins carry no path, query or fragment"
            )));
        }
        Ok(Self(origin))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, client_origin: &str) -> bool {
        self.0 == client_origin
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Origin({})", self.0)
    }
}

impl std::str::FromStr for Origin {
    type Err = DataConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Server-issued challenge bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Challenge(Vec<u8>);

impl Challenge {
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// A fresh 32-byte random challenge.
    pub fn random() -> Result<Self, openssl::error::ErrorStack> {
        let mut bytes = vec![0u8; 32];
        openssl::rand::rand_bytes(&mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn from_base64url(encoded: &str) -> ConversionResult<Self> {
        Ok(Self(base64url::decode(encoded)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64url(&self) -> String {
        base64url::encode(&self.0)
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Challenge({})", self.to_base64url())
    }
}

/// Origins, rpId, challenge and optional token-binding id the relying party expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProperty {
    origins: Vec<Origin>,
    rp_id: String,
    challenge: Challenge,
    token_binding_id: Option<Vec<u8>>,
}

impl ServerProperty {
    pub fn new(origin: Origin, rp_id: impl Into<String>, challenge: Challenge) -> Self {
        Self {
            origins: vec![origin],
            rp_id: rp_id.into(),
            challenge,
            token_binding_id: None,
        }
    }

    /// Accept any of `origins`. An empty set accepts nothing.
    pub fn with_origins(mut self, origins: impl IntoIterator<Item = Origin>) -> Self {
        self.origins = origins.into_iter().collect();
        self
    }

    pub fn with_token_binding_id(mut self, id: &[u8]) -> Self {
        self.token_binding_id = Some(id.to_vec());
        self
    }

    pub fn origins(&self) -> &[Origin] {
        &self.origins
    }

    pub fn is_acceptable_origin(&self, client_origin: &str) -> bool {
        self.origins.iter().any(|o| o.matches(client_origin))
    }

    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    pub fn rp_id_hash(&self) -> [u8; 32] {
        crypto::sha256(self.rp_id.as_bytes())
    }

    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    pub fn token_binding_id(&self) -> Option<&[u8]> {
        self.token_binding_id.as_deref()
    }
}
