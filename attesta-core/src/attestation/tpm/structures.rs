//! TPM 2.0 wire structures used by `tpm` attestation: `TPMT_PUBLIC` and `TPMS_ATTEST`.
//!
//! All integers are big-endian. `TPM2B_*` values are a u16 length followed by bytes.

use openssl::hash::MessageDigest;

use crate::data::{CoseCurve, CoseKeyParams};
use crate::error::{VerificationError, VerificationResult};

pub const TPM_GENERATED_VALUE: u32 = 0xff54_4347;
pub const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

pub const TPM_ALG_RSA: u16 = 0x0001;
pub const TPM_ALG_ECC: u16 = 0x0023;
pub const TPM_ALG_NULL: u16 = 0x0010;

const TPM_ECC_NIST_P256: u16 = 0x0003;
const TPM_ECC_NIST_P384: u16 = 0x0004;
const TPM_ECC_NIST_P521: u16 = 0x0005;

/// Name algorithms (`TPMI_ALG_HASH`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpmHashAlg {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl TpmHashAlg {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0004 => Some(Self::Sha1),
            0x000B => Some(Self::Sha256),
            0x000C => Some(Self::Sha384),
            0x000D => Some(Self::Sha512),
            _ => None,
        }
    }

    pub fn value(self) -> u16 {
        match self {
            Self::Sha1 => 0x0004,
            Self::Sha256 => 0x000B,
            Self::Sha384 => 0x000C,
            Self::Sha512 => 0x000D,
        }
    }

    pub fn message_digest(self) -> MessageDigest {
        match self {
            Self::Sha1 => MessageDigest::sha1(),
            Self::Sha256 => MessageDigest::sha256(),
            Self::Sha384 => MessageDigest::sha384(),
            Self::Sha512 => MessageDigest::sha512(),
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    what: &'static str,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], what: &'static str) -> Self {
        Self { bytes, what }
    }

    fn take(&mut self, n: usize) -> VerificationResult<&'a [u8]> {
        if self.bytes.len() < n {
            return Err(VerificationError::bad_statement(format!(
                "{} is truncated",
                self.what
            )));
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn u16(&mut self) -> VerificationResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> VerificationResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> VerificationResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(buf))
    }

    fn tpm2b(&mut self) -> VerificationResult<Vec<u8>> {
        let len = self.u16()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// `TPMT_*_SCHEME`-shaped value: an algorithm id, plus a hash id unless NULL.
    fn scheme(&mut self) -> VerificationResult<(u16, Option<u16>)> {
        let scheme = self.u16()?;
        if scheme == TPM_ALG_NULL {
            Ok((scheme, None))
        } else {
            Ok((scheme, Some(self.u16()?)))
        }
    }

    fn finish(self) -> VerificationResult<()> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(VerificationError::bad_statement(format!(
                "{} has {} trailing bytes",
                self.what,
                self.bytes.len()
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubAreaParameters {
    Rsa {
        symmetric: u16,
        scheme: u16,
        key_bits: u16,
        /// Zero means the default exponent, 65537.
        exponent: u32,
    },
    Ecc {
        symmetric: u16,
        scheme: u16,
        curve_id: u16,
        kdf: u16,
    },
}

/// `TPMT_PUBLIC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubArea {
    pub alg_type: u16,
    pub name_alg: u16,
    pub object_attributes: u32,
    pub auth_policy: Vec<u8>,
    pub parameters: PubAreaParameters,
    /// RSA: `[n]`; ECC: `[x, y]`.
    pub unique: Vec<Vec<u8>>,
}

impl PubArea {
    pub fn parse(bytes: &[u8]) -> VerificationResult<Self> {
        let mut r = Reader::new(bytes, "pubArea");
        let alg_type = r.u16()?;
        let name_alg = r.u16()?;
        let object_attributes = r.u32()?;
        let auth_policy = r.tpm2b()?;

        let (parameters, unique) = match alg_type {
            TPM_ALG_RSA => {
                let symmetric = r.u16()?;
                if symmetric != TPM_ALG_NULL {
                    return Err(VerificationError::bad_statement(
                        "pubArea symmetric algorithm must be TPM_ALG_NULL",
                    ));
                }
                let (scheme, _) = r.scheme()?;
                let key_bits = r.u16()?;
                let exponent = r.u32()?;
                let n = r.tpm2b()?;
                (
                    PubAreaParameters::Rsa {
                        symmetric,
                        scheme,
                        key_bits,
                        exponent,
                    },
                    vec![n],
                )
            }
            TPM_ALG_ECC => {
                let symmetric = r.u16()?;
                if symmetric != TPM_ALG_NULL {
                    return Err(VerificationError::bad_statement(
                        "pubArea symmetric algorithm must be TPM_ALG_NULL",
                    ));
                }
                let (scheme, _) = r.scheme()?;
                let curve_id = r.u16()?;
                let (kdf, _) = r.scheme()?;
                let x = r.tpm2b()?;
                let y = r.tpm2b()?;
                (
                    PubAreaParameters::Ecc {
                        symmetric,
                        scheme,
                        curve_id,
                        kdf,
                    },
                    vec![x, y],
                )
            }
            other => {
                return Err(VerificationError::bad_statement(format!(
                    "unsupported pubArea type {other:#06x}"
                )))
            }
        };
        r.finish()?;

        Ok(Self {
            alg_type,
            name_alg,
            object_attributes,
            auth_policy,
            parameters,
            unique,
        })
    }

    /// The public key in COSE terms.
    pub fn key_params(&self) -> VerificationResult<CoseKeyParams> {
        match (&self.parameters, self.unique.as_slice()) {
            (PubAreaParameters::Rsa { exponent, .. }, [n]) => {
                let e = if *exponent == 0 { 65_537 } else { *exponent };
                Ok(CoseKeyParams::Rsa {
                    n: n.clone(),
                    e: e.to_be_bytes().to_vec(),
                })
            }
            (PubAreaParameters::Ecc { curve_id, .. }, [x, y]) => {
                let curve = match *curve_id {
                    TPM_ECC_NIST_P256 => CoseCurve::P256,
                    TPM_ECC_NIST_P384 => CoseCurve::P384,
                    TPM_ECC_NIST_P521 => CoseCurve::P521,
                    other => {
                        return Err(VerificationError::bad_statement(format!(
                            "unsupported TPM curve {other:#06x}"
                        )))
                    }
                };
                Ok(CoseKeyParams::Ec2 {
                    curve,
                    x: x.clone(),
                    y: y.clone(),
                })
            }
            _ => Err(VerificationError::bad_statement("pubArea unique is malformed")),
        }
    }
}

/// `TPMS_ATTEST` with `TPMS_CERTIFY_INFO` as the attested member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    pub magic: u32,
    pub attest_type: u16,
    pub qualified_signer: Vec<u8>,
    pub extra_data: Vec<u8>,
    pub clock_info: [u8; 17],
    pub firmware_version: u64,
    pub attested_name: Vec<u8>,
    pub attested_qualified_name: Vec<u8>,
}

impl CertInfo {
    pub fn parse(bytes: &[u8]) -> VerificationResult<Self> {
        let mut r = Reader::new(bytes, "certInfo");
        let magic = r.u32()?;
        let attest_type = r.u16()?;
        let qualified_signer = r.tpm2b()?;
        let extra_data = r.tpm2b()?;
        let mut clock_info = [0u8; 17];
        clock_info.copy_from_slice(r.take(17)?);
        let firmware_version = r.u64()?;
        let attested_name = r.tpm2b()?;
        let attested_qualified_name = r.tpm2b()?;
        r.finish()?;

        Ok(Self {
            magic,
            attest_type,
            qualified_signer,
            extra_data,
            clock_info,
            firmware_version,
            attested_name,
            attested_qualified_name,
        })
    }
}
