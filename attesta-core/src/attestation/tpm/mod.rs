//! `tpm` attestation (WebAuthn §8.3).

pub mod structures;

use openssl::hash::hash;
use tracing::debug;
use x509_parser::prelude::*;

use crate::crypto;
use crate::data::{AttestationFormat, AttestationObject, AttestationStatement, CoseAlgorithm};
use crate::error::{VerificationError, VerificationResult};

use super::certificate::{check_not_ca, AttestationCertificate};
use super::{
    attested_credential, require, signed_data, AttestationStatementVerifier, AttestationType,
    CertificatePath, VerifiedAttestation,
};
use structures::{CertInfo, PubArea, TpmHashAlg, TPM_GENERATED_VALUE, TPM_ST_ATTEST_CERTIFY};

const TCG_AT_TPM_MANUFACTURER: &str = "2.23.133.2.1";
const TCG_AT_TPM_MODEL: &str = "2.23.133.2.2";
const TCG_AT_TPM_VERSION: &str = "2.23.133.2.3";
const TCG_KP_AIK_CERTIFICATE: &str = "2.23.133.8.3";

/// TCG vendor ids, as they appear in the manufacturer attribute.
pub const TPM_MANUFACTURERS: &[&str] = &[
    "id:414D4400", // AMD
    "id:41544D4C", // Atmel
    "id:4252434D", // Broadcom
    "id:4353434F", // Cisco
    "id:464C5953", // Flyslice
    "id:48504500", // HPE
    "id:49424D00", // IBM
    "id:49465800", // Infineon
    "id:494E5443", // Intel
    "id:4C454E00", // Lenovo
    "id:4D534654", // Microsoft
    "id:4E534D20", // National Semiconductor
    "id:4E545A00", // Nationz
    "id:4E544300", // Nuvoton
    "id:51434F4D", // Qualcomm
    "id:534D5343", // SMSC
    "id:53544D20", // STMicroelectronics
    "id:534D534E", // Samsung
    "id:534E5300", // Sinosun
    "id:54584E00", // Texas Instruments
    "id:57454300", // Winbond
    "id:524F4343", // Fuzhou Rockchip
    "id:474F4F47", // Google
    "id:FFFFF1D0", // FIDO conformance
];

#[derive(Debug, Clone, Copy, Default)]
pub struct TpmAttestationStatementVerifier;

impl AttestationStatementVerifier for TpmAttestationStatementVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::Tpm
    }

    fn verify(
        &self,
        object: &AttestationObject,
        client_data_hash: &[u8; 32],
    ) -> VerificationResult<VerifiedAttestation> {
        let AttestationStatement::Tpm(statement) = object.statement() else {
            return Err(VerificationError::bad_statement("not a tpm statement"));
        };
        let ver = require(statement.ver.as_deref(), "ver")?;
        if ver != "2.0" {
            return Err(VerificationError::bad_statement(format!(
                "unsupported TPM version {ver}"
            )));
        }
        let alg_id = require(statement.alg, "alg")?;
        let alg = CoseAlgorithm::from_i64(alg_id)
            .ok_or_else(|| VerificationError::bad_statement(format!("unsupported alg {alg_id}")))?;
        let sig = require(statement.sig.as_ref(), "sig")?;
        let x5c = require(statement.x5c.as_ref(), "x5c")?;
        let pub_area_bytes = require(statement.pub_area.as_ref(), "pubArea")?;
        let cert_info_bytes = require(statement.cert_info.as_ref(), "certInfo")?;
        let path = CertificatePath::from_x5c(x5c)?;

        let pub_area = PubArea::parse(pub_area_bytes)?;
        let credential = attested_credential(object)?;
        if !pub_area
            .key_params()?
            .same_key(credential.credential_public_key().params())
        {
            return Err(VerificationError::PublicKeyMismatch);
        }

        let cert_info = CertInfo::parse(cert_info_bytes)?;
        if cert_info.magic != TPM_GENERATED_VALUE {
            return Err(VerificationError::bad_statement(
                "certInfo magic is not TPM_GENERATED_VALUE",
            ));
        }
        if cert_info.attest_type != TPM_ST_ATTEST_CERTIFY {
            return Err(VerificationError::bad_statement(
                "certInfo type is not TPM_ST_ATTEST_CERTIFY",
            ));
        }

        let att_to_be_signed = signed_data(object, client_data_hash);
        let expected_extra = crypto::digest_for(alg, &att_to_be_signed)?;
        if cert_info.extra_data != expected_extra {
            return Err(VerificationError::bad_statement(
                "certInfo extraData does not match attToBeSigned",
            ));
        }

        let name_alg = TpmHashAlg::from_u16(pub_area.name_alg).ok_or_else(|| {
            VerificationError::bad_statement(format!(
                "unsupported nameAlg {:#06x}",
                pub_area.name_alg
            ))
        })?;
        let mut expected_name = name_alg.value().to_be_bytes().to_vec();
        expected_name.extend_from_slice(&hash(name_alg.message_digest(), pub_area_bytes)?);
        if cert_info.attested_name != expected_name {
            return Err(VerificationError::bad_statement(
                "certInfo attested name does not match pubArea",
            ));
        }

        let aik = path.require_leaf()?;
        aik.verify_signature(alg, cert_info_bytes, sig)?;
        check_aik_certificate(aik)?;
        aik.check_aaguid_extension(&credential.aaguid())?;

        debug!(%alg, "tpm attestation verified");
        Ok(VerifiedAttestation::new(AttestationType::AttCa, path))
    }
}

/// AIK certificate requirements (WebAuthn §8.3.1).
fn check_aik_certificate(aik: &AttestationCertificate) -> VerificationResult<()> {
    let parsed = aik.parsed()?;
    if parsed.version() != X509Version::V3 {
        return Err(VerificationError::certificate("AIK certificate is not version 3"));
    }
    if parsed.subject().iter().next().is_some() {
        return Err(VerificationError::certificate("AIK subject must be empty"));
    }

    let san = parsed
        .subject_alternative_name()
        .map_err(|e| VerificationError::certificate(format!("bad subjectAltName: {e}")))?
        .ok_or_else(|| VerificationError::certificate("AIK subjectAltName is missing"))?;
    let mut manufacturer = None;
    let mut model = None;
    let mut version = None;
    for name in &san.value.general_names {
        if let GeneralName::DirectoryName(dn) = name {
            for attr in dn.iter_attributes() {
                let value = attr.as_str().ok().map(str::to_string);
                match attr.attr_type().to_id_string().as_str() {
                    TCG_AT_TPM_MANUFACTURER => manufacturer = value,
                    TCG_AT_TPM_MODEL => model = value,
                    TCG_AT_TPM_VERSION => version = value,
                    _ => {}
                }
            }
        }
    }
    let (Some(manufacturer), Some(_), Some(_)) = (manufacturer, model, version) else {
        return Err(VerificationError::certificate(
            "AIK subjectAltName lacks TPM manufacturer, model or version",
        ));
    };
    if !TPM_MANUFACTURERS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(&manufacturer))
    {
        return Err(VerificationError::certificate(format!(
            "unknown TPM manufacturer {manufacturer}"
        )));
    }

    let eku = parsed
        .extended_key_usage()
        .map_err(|e| VerificationError::certificate(format!("bad extendedKeyUsage: {e}")))?
        .ok_or_else(|| VerificationError::certificate("AIK extendedKeyUsage is missing"))?;
    if !eku
        .value
        .other
        .iter()
        .any(|oid| oid.to_id_string() == TCG_KP_AIK_CERTIFICATE)
    {
        return Err(VerificationError::certificate(
            "AIK extendedKeyUsage lacks tcg-kp-AIKCertificate",
        ));
    }

    check_not_ca(&parsed)
}
