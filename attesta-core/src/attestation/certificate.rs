//! X.509 helpers shared by the certificate-bearing formats.
//!
//! OpenSSL holds the certificate for signature and chain work; x509-parser is used for
//! structural inspection (names, extensions) where OpenSSL's accessors are thin.

use std::fmt;

use der_parser::der::parse_der_octetstring;
use openssl::pkey::{Id, PKey, Public};
use openssl::x509::{X509VerifyResult, X509};
use x509_parser::prelude::*;

use crate::crypto;
use crate::data::{Aaguid, CoseAlgorithm, CoseCurve, CoseKeyParams};
use crate::error::{VerificationError, VerificationResult};

/// `id-fido-gen-ce-aaguid`
pub const FIDO_AAGUID_EXTENSION_OID: &str = "1.3.6.1.4.1.45724.1.1.4";

/// A certificate from an `x5c` array, kept with its DER encoding.
#[derive(Clone)]
pub struct AttestationCertificate {
    der: Vec<u8>,
    x509: X509,
}

impl AttestationCertificate {
    pub fn from_der(der: &[u8]) -> VerificationResult<Self> {
        let x509 = X509::from_der(der)
            .map_err(|e| VerificationError::bad_statement(format!("undecodable certificate: {e}")))?;
        Ok(Self {
            der: der.to_vec(),
            x509,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn x509(&self) -> &X509 {
        &self.x509
    }

    /// Structural view of the certificate.
    pub fn parsed(&self) -> VerificationResult<X509Certificate<'_>> {
        X509Certificate::from_der(&self.der)
            .map(|(_, cert)| cert)
            .map_err(|e| VerificationError::certificate(format!("unparsable certificate: {e}")))
    }

    pub fn public_key(&self) -> VerificationResult<PKey<Public>> {
        Ok(self.x509.public_key()?)
    }

    /// Subject key material in COSE terms, `None` for unsupported key types.
    pub fn key_params(&self) -> VerificationResult<Option<CoseKeyParams>> {
        let key = self.public_key()?;
        Ok(CoseKeyParams::from_pkey(&key)?)
    }

    pub fn is_ec_p256(&self) -> VerificationResult<bool> {
        Ok(matches!(
            self.key_params()?,
            Some(CoseKeyParams::Ec2 {
                curve: CoseCurve::P256,
                ..
            })
        ))
    }

    pub fn verify_signature(
        &self,
        alg: CoseAlgorithm,
        data: &[u8],
        signature: &[u8],
    ) -> VerificationResult<()> {
        let key = self.public_key()?;
        let expected = match alg {
            CoseAlgorithm::EdDSA => Id::ED25519,
            alg if alg.is_rsa() => Id::RSA,
            _ => Id::EC,
        };
        if key.id() != expected {
            return Err(VerificationError::BadSignature);
        }
        crypto::verify_signature(&key, alg, data, signature)
    }

    /// Criticality and raw value of the extension `oid`, if present.
    pub fn extension_value(&self, oid: &str) -> VerificationResult<Option<(bool, Vec<u8>)>> {
        let parsed = self.parsed()?;
        Ok(parsed
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == oid)
            .map(|ext| (ext.critical, ext.value.to_vec())))
    }

    /// SHA-1 over the subjectPublicKey bit string (RFC 5280 §4.2.1.2, method 1).
    pub fn key_identifier(&self) -> VerificationResult<Vec<u8>> {
        let parsed = self.parsed()?;
        let bits: &[u8] = &parsed.tbs_certificate.subject_pki.subject_public_key.data;
        Ok(openssl::sha::sha1(bits).to_vec())
    }

    pub fn is_self_signed(&self) -> bool {
        self.x509.issued(&self.x509) == X509VerifyResult::OK
            && self
                .x509
                .public_key()
                .and_then(|key| self.x509.verify(&key))
                .unwrap_or(false)
    }

    pub fn common_name(&self) -> Option<String> {
        let parsed = self.parsed().ok()?;
        let cn = parsed
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_string);
        cn
    }

    /// If the FIDO AAGUID extension is present it must be non-critical and match.
    pub fn check_aaguid_extension(&self, aaguid: &Aaguid) -> VerificationResult<()> {
        let Some((critical, value)) = self.extension_value(FIDO_AAGUID_EXTENSION_OID)? else {
            return Ok(());
        };
        if critical {
            return Err(VerificationError::certificate(
                "AAGUID extension must not be critical",
            ));
        }
        let (_, object) = parse_der_octetstring(&value)
            .map_err(|_| VerificationError::certificate("AAGUID extension is not an OCTET STRING"))?;
        let bytes = object
            .as_slice()
            .map_err(|_| VerificationError::certificate("AAGUID extension is not an OCTET STRING"))?;
        if bytes != aaguid.as_bytes() {
            return Err(VerificationError::BadAaguid);
        }
        Ok(())
    }

    /// Requirements for `packed` attestation certificates (WebAuthn §8.2.1).
    pub fn check_packed_requirements(&self) -> VerificationResult<()> {
        let parsed = self.parsed()?;
        if parsed.version() != X509Version::V3 {
            return Err(VerificationError::certificate("certificate is not version 3"));
        }

        let subject = parsed.subject();
        if subject.iter_country().next().is_none() {
            return Err(VerificationError::certificate("subject C is missing"));
        }
        if subject.iter_organization().next().is_none() {
            return Err(VerificationError::certificate("subject O is missing"));
        }
        if subject.iter_common_name().next().is_none() {
            return Err(VerificationError::certificate("subject CN is missing"));
        }
        let ou_ok = subject
            .iter_organizational_unit()
            .any(|attr| attr.as_str().ok() == Some("Authenticator Attestation"));
        if !ou_ok {
            return Err(VerificationError::certificate(
                "subject OU must be \"Authenticator Attestation\"",
            ));
        }

        check_not_ca(&parsed)
    }
}

pub(crate) fn check_not_ca(parsed: &X509Certificate<'_>) -> VerificationResult<()> {
    let constraints = parsed
        .basic_constraints()
        .map_err(|e| VerificationError::certificate(format!("bad basic constraints: {e}")))?;
    if constraints.is_some_and(|bc| bc.value.ca) {
        return Err(VerificationError::certificate(
            "attestation certificate must not be a CA",
        ));
    }
    Ok(())
}

impl fmt::Debug for AttestationCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = self
            .parsed()
            .map(|c| c.subject().to_string())
            .unwrap_or_default();
        f.debug_struct("AttestationCertificate")
            .field("subject", &subject)
            .finish()
    }
}

/// A leaf-first certificate chain.
#[derive(Debug, Clone, Default)]
pub struct CertificatePath(Vec<AttestationCertificate>);

impl CertificatePath {
    /// Decode an `x5c` array. An empty array is a malformed statement.
    pub fn from_x5c(x5c: &[Vec<u8>]) -> VerificationResult<Self> {
        if x5c.is_empty() {
            return Err(VerificationError::bad_statement("x5c is empty"));
        }
        x5c.iter()
            .map(|der| AttestationCertificate::from_der(der))
            .collect::<VerificationResult<Vec<_>>>()
            .map(Self)
    }

    pub fn leaf(&self) -> Option<&AttestationCertificate> {
        self.0.first()
    }

    pub(crate) fn require_leaf(&self) -> VerificationResult<&AttestationCertificate> {
        self.leaf()
            .ok_or_else(|| VerificationError::bad_statement("x5c is empty"))
    }

    /// Everything after the leaf.
    pub fn intermediates(&self) -> &[AttestationCertificate] {
        self.0.get(1..).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttestationCertificate> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
