//! `android-safetynet` attestation (WebAuthn §8.5).
//!
//! The statement's `response` is a compact JWS signed by Google's attestation service.
//! The signing chain travels in the JWS header's `x5c`.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde::Deserialize;
use tracing::debug;

use crate::crypto;
use crate::data::{AttestationFormat, AttestationObject, AttestationStatement, CoseKeyParams};
use crate::error::{VerificationError, VerificationResult};

use super::{
    require, signed_data, AttestationCertificate, AttestationStatementVerifier, AttestationType,
    CertificatePath, VerifiedAttestation,
};

const SAFETYNET_HOSTNAME: &str = "attest.android.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafetyNetPayload {
    nonce: String,
    timestamp_ms: i64,
    #[serde(default)]
    apk_package_name: Option<String>,
    cts_profile_match: bool,
    #[serde(default)]
    basic_integrity: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct AndroidSafetyNetAttestationStatementVerifier {
    clock_skew: Duration,
}

impl Default for AndroidSafetyNetAttestationStatementVerifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl AndroidSafetyNetAttestationStatementVerifier {
    /// `clock_skew` bounds how far in the future `timestampMs` may be.
    pub fn new(clock_skew: Duration) -> Self {
        Self { clock_skew }
    }
}

fn decoding_key(leaf: &AttestationCertificate) -> VerificationResult<DecodingKey> {
    let key = leaf.public_key()?;
    if let Ok(rsa) = key.rsa() {
        return Ok(DecodingKey::from_rsa_der(&rsa.public_key_to_der_pkcs1()?));
    }
    match CoseKeyParams::from_pkey(&key)? {
        Some(CoseKeyParams::Ec2 { x, y, .. }) => {
            let mut point = Vec::with_capacity(1 + x.len() + y.len());
            point.push(0x04);
            point.extend_from_slice(&x);
            point.extend_from_slice(&y);
            Ok(DecodingKey::from_ec_der(&point))
        }
        _ => Err(VerificationError::certificate(
            "unsupported SafetyNet signing key type",
        )),
    }
}

impl AttestationStatementVerifier for AndroidSafetyNetAttestationStatementVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::AndroidSafetyNet
    }

    fn verify(
        &self,
        object: &AttestationObject,
        client_data_hash: &[u8; 32],
    ) -> VerificationResult<VerifiedAttestation> {
        let AttestationStatement::AndroidSafetyNet(statement) = object.statement() else {
            return Err(VerificationError::bad_statement(
                "not an android-safetynet statement",
            ));
        };
        let ver = require(statement.ver.as_deref(), "ver")?;
        if ver.is_empty() {
            return Err(VerificationError::bad_statement("ver is empty"));
        }
        let response = require(statement.response.as_ref(), "response")?;
        let jws = std::str::from_utf8(response)
            .map_err(|_| VerificationError::bad_statement("response is not UTF-8"))?;

        let header = decode_header(jws)
            .map_err(|e| VerificationError::bad_statement(format!("response is not a JWS: {e}")))?;
        let x5c = header
            .x5c
            .as_ref()
            .ok_or_else(|| VerificationError::bad_statement("JWS header has no x5c"))?
            .iter()
            .map(|c| STANDARD.decode(c))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VerificationError::bad_statement("JWS x5c is not base64"))?;
        let path = CertificatePath::from_x5c(&x5c)?;
        let leaf = path.require_leaf()?;

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        let payload = decode::<SafetyNetPayload>(jws, &decoding_key(leaf)?, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidEcdsaKey
                | ErrorKind::InvalidRsaKey(_) => VerificationError::BadSignature,
                _ => VerificationError::bad_statement(format!("invalid SafetyNet payload: {e}")),
            })?
            .claims;

        if leaf.common_name().as_deref() != Some(SAFETYNET_HOSTNAME) {
            return Err(VerificationError::certificate(format!(
                "SafetyNet certificate is not issued to {SAFETYNET_HOSTNAME}"
            )));
        }

        let expected_nonce = crypto::sha256(&signed_data(object, client_data_hash));
        let nonce = STANDARD
            .decode(payload.nonce.as_bytes())
            .map_err(|_| VerificationError::bad_statement("nonce is not base64"))?;
        if nonce != expected_nonce {
            return Err(VerificationError::bad_statement(
                "nonce does not match SHA-256(authenticatorData || clientDataHash)",
            ));
        }
        if !payload.cts_profile_match {
            return Err(VerificationError::bad_statement("ctsProfileMatch is false"));
        }

        let skew = i64::try_from(self.clock_skew.as_millis()).unwrap_or(i64::MAX);
        let latest = chrono::Utc::now().timestamp_millis().saturating_add(skew);
        if payload.timestamp_ms > latest {
            return Err(VerificationError::bad_statement(
                "timestampMs lies in the future",
            ));
        }

        debug!(
            apk_package_name = payload.apk_package_name.as_deref().unwrap_or(""),
            basic_integrity = payload.basic_integrity,
            "android-safetynet attestation verified"
        );
        Ok(VerifiedAttestation::new(AttestationType::Basic, path))
    }
}
