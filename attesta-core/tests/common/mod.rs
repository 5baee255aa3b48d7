//! A software authenticator for integration tests.
//!
//! Builds real keys, certificates, authenticator data and attestation objects with
//! OpenSSL and ciborium so every pipeline stage runs against genuine bytes.

#![allow(dead_code)]

use attesta_core::codec::base64url;
use attesta_core::crypto::sha256;
use attesta_core::data::{AuthenticatorFlags, CoseAlgorithm, CoseKey, CoseKeyParams};
use attesta_core::{
    AuthenticationParameters, AuthenticationRequest, Challenge, CoreCredentialRecord, Origin,
    RegistrationParameters, RegistrationRequest, ServerProperty,
};
use ciborium::value::Value;
use openssl::asn1::{Asn1Integer, Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use openssl::x509::extension::{BasicConstraints, ExtendedKeyUsage};
use openssl::x509::{X509Builder, X509Extension, X509Name, X509NameBuilder, X509};

pub const RP_ID: &str = "example.com";
pub const ORIGIN: &str = "https://example.com";
pub const CHALLENGE: &[u8] = b"server-issued-challenge-0001";
pub const AAGUID: [u8; 16] = [
    0x2f, 0xc0, 0x57, 0x9f, 0x81, 0x13, 0x47, 0xea, 0xb1, 0x16, 0xbb, 0x5a, 0x8d, 0xb9, 0x20, 0x2a,
];

pub const UP: u8 = AuthenticatorFlags::USER_PRESENT;
pub const UV: u8 = AuthenticatorFlags::USER_VERIFIED;
pub const BE: u8 = AuthenticatorFlags::BACKUP_ELIGIBLE;
pub const BS: u8 = AuthenticatorFlags::BACKUP_STATE;
pub const AT: u8 = AuthenticatorFlags::ATTESTED_CREDENTIAL_DATA;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("attesta_core=debug")
        .with_test_writer()
        .try_init();
}

pub fn server_property() -> ServerProperty {
    ServerProperty::new(
        Origin::new(ORIGIN).expect("Valid origin"),
        RP_ID,
        Challenge::new(CHALLENGE),
    )
}

pub fn registration_parameters() -> RegistrationParameters {
    RegistrationParameters::new(server_property())
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// A private key plus the COSE algorithm it signs with.
pub struct TestKey {
    pub private: PKey<Private>,
    pub alg: CoseAlgorithm,
}

impl TestKey {
    pub fn es256() -> Self {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        Self {
            private: PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap(),
            alg: CoseAlgorithm::ES256,
        }
    }

    pub fn rs256() -> Self {
        Self {
            private: PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap(),
            alg: CoseAlgorithm::RS256,
        }
    }

    pub fn params(&self) -> CoseKeyParams {
        let public = PKey::public_key_from_der(&self.private.public_key_to_der().unwrap()).unwrap();
        CoseKeyParams::from_pkey(&public)
            .unwrap()
            .expect("Supported key type")
    }

    pub fn cose_key(&self) -> CoseKey {
        CoseKey::new(self.alg, self.params()).expect("Failed to build COSE key")
    }

    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let md = match self.alg {
            CoseAlgorithm::ES384 => MessageDigest::sha384(),
            _ => MessageDigest::sha256(),
        };
        let mut signer = Signer::new(md, &self.private).unwrap();
        signer.update(data).unwrap();
        signer.sign_to_vec().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Minimal DER writer for extension values
// ---------------------------------------------------------------------------

pub mod der {
    fn length(len: usize) -> Vec<u8> {
        if len < 0x80 {
            return vec![len as u8];
        }
        let bytes: Vec<u8> = len
            .to_be_bytes()
            .into_iter()
            .skip_while(|b| *b == 0)
            .collect();
        let mut out = vec![0x80 | bytes.len() as u8];
        out.extend(bytes);
        out
    }

    pub fn tlv(tag: &[u8], content: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend(length(content.len()));
        out.extend_from_slice(content);
        out
    }

    pub fn sequence(items: &[Vec<u8>]) -> Vec<u8> {
        tlv(&[0x30], &items.concat())
    }

    pub fn set(items: &[Vec<u8>]) -> Vec<u8> {
        tlv(&[0x31], &items.concat())
    }

    pub fn octet_string(bytes: &[u8]) -> Vec<u8> {
        tlv(&[0x04], bytes)
    }

    pub fn utf8(s: &str) -> Vec<u8> {
        tlv(&[0x0c], s.as_bytes())
    }

    pub fn null() -> Vec<u8> {
        vec![0x05, 0x00]
    }

    pub fn integer(value: u32) -> Vec<u8> {
        let mut bytes: Vec<u8> = value
            .to_be_bytes()
            .into_iter()
            .skip_while(|b| *b == 0)
            .collect();
        if bytes.first().map_or(true, |b| b & 0x80 != 0) {
            bytes.insert(0, 0);
        }
        tlv(&[0x02], &bytes)
    }

    fn base128(mut value: u32) -> Vec<u8> {
        let mut out = vec![(value & 0x7f) as u8];
        value >>= 7;
        while value > 0 {
            out.insert(0, 0x80 | (value & 0x7f) as u8);
            value >>= 7;
        }
        out
    }

    pub fn oid(dotted: &str) -> Vec<u8> {
        let arcs: Vec<u32> = dotted.split('.').map(|a| a.parse().unwrap()).collect();
        let mut body = base128(arcs[0] * 40 + arcs[1]);
        for arc in &arcs[2..] {
            body.extend(base128(*arc));
        }
        tlv(&[0x06], &body)
    }

    /// `[n] EXPLICIT`, context-specific and constructed.
    pub fn explicit(n: u32, content: &[u8]) -> Vec<u8> {
        let tag = if n < 31 {
            vec![0xa0 | n as u8]
        } else {
            let mut tag = vec![0xbf];
            tag.extend(base128(n));
            tag
        };
        tlv(&tag, content)
    }
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

/// Raw extension: OID, critical, DER value.
pub type RawExtension = (String, bool, Vec<u8>);

pub struct CertSpec {
    pub subject: Vec<(&'static str, String)>,
    pub ca: bool,
    pub eku: Option<&'static str>,
    pub extensions: Vec<RawExtension>,
    pub not_before: i64,
    pub not_after: i64,
    pub serial: u32,
}

impl CertSpec {
    pub fn new(cn: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            subject: vec![("CN", cn.to_string())],
            ca: false,
            eku: None,
            extensions: Vec::new(),
            not_before: now - 3600,
            not_after: now + 30 * 86_400,
            serial: 1,
        }
    }

    /// Subject satisfying the packed attestation certificate requirements.
    pub fn packed_leaf() -> Self {
        Self {
            subject: vec![
                ("C", "US".to_string()),
                ("O", "Attesta Test Vendor".to_string()),
                ("OU", "Authenticator Attestation".to_string()),
                ("CN", "Attesta Test Authenticator".to_string()),
            ],
            ..Self::new("")
        }
    }

    pub fn ca(cn: &str) -> Self {
        Self {
            ca: true,
            serial: 100,
            ..Self::new(cn)
        }
    }

    pub fn with_extension(mut self, oid: &str, critical: bool, value: Vec<u8>) -> Self {
        self.extensions.push((oid.to_string(), critical, value));
        self
    }

    pub fn expired(mut self) -> Self {
        let now = chrono::Utc::now().timestamp();
        self.not_before = now - 60 * 86_400;
        self.not_after = now - 30 * 86_400;
        self
    }

    fn name(&self) -> X509Name {
        let mut name = X509NameBuilder::new().unwrap();
        for (field, value) in &self.subject {
            if !value.is_empty() {
                name.append_entry_by_text(field, value).unwrap();
            }
        }
        name.build()
    }
}

/// Issue a certificate for `subject_key`, signed by `issuer` or self-signed.
pub fn issue(spec: &CertSpec, subject_key: &TestKey, issuer: Option<(&X509, &TestKey)>) -> X509 {
    let name = spec.name();
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial: Asn1Integer = BigNum::from_u32(spec.serial).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    match issuer {
        Some((cert, _)) => builder.set_issuer_name(cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }
    builder.set_pubkey(&subject_key.private).unwrap();
    builder
        .set_not_before(&Asn1Time::from_unix(spec.not_before).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(spec.not_after).unwrap())
        .unwrap();

    let mut bc = BasicConstraints::new();
    if spec.ca {
        bc.critical().ca();
    }
    builder.append_extension(bc.build().unwrap()).unwrap();
    if let Some(eku) = spec.eku {
        builder
            .append_extension(ExtendedKeyUsage::new().other(eku).build().unwrap())
            .unwrap();
    }
    for (oid, critical, value) in &spec.extensions {
        let oid = Asn1Object::from_str(oid).unwrap();
        let value = Asn1OctetString::new_from_bytes(value).unwrap();
        builder
            .append_extension(X509Extension::new_from_der(&oid, *critical, &value).unwrap())
            .unwrap();
    }

    let signing_key = issuer.map_or(&subject_key.private, |(_, key)| &key.private);
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// A root CA and its key.
pub struct TestCa {
    pub key: TestKey,
    pub cert: X509,
}

impl TestCa {
    pub fn new(cn: &str) -> Self {
        let key = TestKey::es256();
        let cert = issue(&CertSpec::ca(cn), &key, None);
        Self { key, cert }
    }

    pub fn issue(&self, spec: &CertSpec, subject_key: &TestKey) -> X509 {
        issue(spec, subject_key, Some((&self.cert, &self.key)))
    }
}

/// The FIDO AAGUID extension value: an OCTET STRING around the AAGUID.
pub fn aaguid_extension(aaguid: &[u8; 16]) -> Vec<u8> {
    der::octet_string(aaguid)
}

// ---------------------------------------------------------------------------
// Ceremony bytes
// ---------------------------------------------------------------------------

pub fn client_data_json(ceremony_type: &str, challenge: &[u8], origin: &str) -> Vec<u8> {
    format!(
        r#"{{"type":"{ceremony_type}","challenge":"{}","origin":"{origin}","crossOrigin":false}}"#,
        base64url::encode(challenge)
    )
    .into_bytes()
}

pub fn authenticator_data(
    rp_id: &str,
    flags: u8,
    sign_count: u32,
    attested: Option<(&[u8; 16], &[u8], &CoseKey)>,
) -> Vec<u8> {
    let mut out = sha256(rp_id.as_bytes()).to_vec();
    out.push(flags);
    out.extend_from_slice(&sign_count.to_be_bytes());
    if let Some((aaguid, credential_id, key)) = attested {
        out.extend_from_slice(aaguid);
        out.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
        out.extend_from_slice(credential_id);
        out.extend_from_slice(key.as_bytes());
    }
    out
}

pub fn attestation_object(fmt: &str, statement: Vec<(&str, Value)>, auth_data: &[u8]) -> Vec<u8> {
    let statement = Value::Map(
        statement
            .into_iter()
            .map(|(k, v)| (Value::Text(k.to_string()), v))
            .collect(),
    );
    let object = Value::Map(vec![
        (Value::Text("fmt".into()), Value::Text(fmt.into())),
        (Value::Text("attStmt".into()), statement),
        (Value::Text("authData".into()), Value::Bytes(auth_data.to_vec())),
    ]);
    let mut out = Vec::new();
    ciborium::ser::into_writer(&object, &mut out).unwrap();
    out
}

pub fn x5c(certs: &[&X509]) -> Value {
    Value::Array(
        certs
            .iter()
            .map(|c| Value::Bytes(c.to_der().unwrap()))
            .collect(),
    )
}

pub fn alg(alg: CoseAlgorithm) -> Value {
    Value::Integer(alg.value().into())
}

/// One authenticator-side registration: the credential and the bytes it commits to.
pub struct Registration {
    pub credential: TestKey,
    pub credential_id: Vec<u8>,
    pub aaguid: [u8; 16],
    pub flags: u8,
    pub sign_count: u32,
    pub rp_id: String,
    pub client_data_json: Vec<u8>,
}

impl Registration {
    pub fn new(credential: TestKey) -> Self {
        Self {
            credential,
            credential_id: b"test-credential-id-0001".to_vec(),
            aaguid: AAGUID,
            flags: UP | UV | AT,
            sign_count: 0,
            rp_id: RP_ID.to_string(),
            client_data_json: client_data_json("webauthn.create", CHALLENGE, ORIGIN),
        }
    }

    pub fn es256() -> Self {
        Self::new(TestKey::es256())
    }

    pub fn authenticator_data(&self) -> Vec<u8> {
        let key = self.credential.cose_key();
        authenticator_data(
            &self.rp_id,
            self.flags,
            self.sign_count,
            Some((&self.aaguid, &self.credential_id, &key)),
        )
    }

    pub fn client_data_hash(&self) -> [u8; 32] {
        sha256(&self.client_data_json)
    }

    /// `authData || clientDataHash`
    pub fn signed_data(&self) -> Vec<u8> {
        let mut data = self.authenticator_data();
        data.extend_from_slice(&self.client_data_hash());
        data
    }

    pub fn request(&self, fmt: &str, statement: Vec<(&str, Value)>) -> RegistrationRequest {
        let object = attestation_object(fmt, statement, &self.authenticator_data());
        RegistrationRequest::new(&object, &self.client_data_json)
    }

    pub fn none_request(&self) -> RegistrationRequest {
        self.request("none", vec![])
    }

    /// `packed` self attestation signed by the credential key.
    pub fn packed_self_request(&self) -> RegistrationRequest {
        let sig = self.credential.sign(&self.signed_data());
        self.request(
            "packed",
            vec![("alg", alg(self.credential.alg)), ("sig", Value::Bytes(sig))],
        )
    }

    /// `packed` full attestation by `attestation_key` with the given chain.
    pub fn packed_full_request(&self, attestation_key: &TestKey, chain: &[&X509]) -> RegistrationRequest {
        let sig = attestation_key.sign(&self.signed_data());
        self.request(
            "packed",
            vec![
                ("alg", alg(attestation_key.alg)),
                ("sig", Value::Bytes(sig)),
                ("x5c", x5c(chain)),
            ],
        )
    }

    pub fn record(&self) -> CoreCredentialRecord {
        let data = attesta_core::data::AttestedCredentialData::new(
            attesta_core::data::Aaguid::new(self.aaguid),
            &self.credential_id,
            self.credential.cose_key(),
        );
        CoreCredentialRecord::new(data, self.sign_count)
    }
}

/// One assertion made with a registered credential.
pub struct Assertion {
    pub flags: u8,
    pub sign_count: u32,
    pub rp_id: String,
    pub client_data_json: Vec<u8>,
}

impl Default for Assertion {
    fn default() -> Self {
        Self {
            flags: UP | UV,
            sign_count: 1,
            rp_id: RP_ID.to_string(),
            client_data_json: client_data_json("webauthn.get", CHALLENGE, ORIGIN),
        }
    }
}

impl Assertion {
    pub fn with_flags(flags: u8) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    pub fn with_counter(sign_count: u32) -> Self {
        Self {
            sign_count,
            ..Self::default()
        }
    }

    pub fn authenticator_data(&self) -> Vec<u8> {
        authenticator_data(&self.rp_id, self.flags, self.sign_count, None)
    }

    pub fn request(&self, registration: &Registration) -> AuthenticationRequest {
        let auth_data = self.authenticator_data();
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&sha256(&self.client_data_json));
        AuthenticationRequest {
            credential_id: registration.credential_id.clone(),
            user_handle: Some(b"user-1".to_vec()),
            authenticator_data: auth_data,
            client_data_json: self.client_data_json.clone(),
            client_extensions_json: None,
            signature: registration.credential.sign(&signed),
        }
    }
}

pub fn authentication_parameters(record: CoreCredentialRecord) -> AuthenticationParameters {
    AuthenticationParameters::new(server_property(), record)
}

// ---------------------------------------------------------------------------
// packed full attestation under a test CA
// ---------------------------------------------------------------------------

pub const FIDO_AAGUID_OID: &str = "1.3.6.1.4.1.45724.1.1.4";

pub struct PackedFixture {
    pub registration: Registration,
    pub ca: TestCa,
    pub attestation_key: TestKey,
    pub leaf: X509,
}

impl PackedFixture {
    pub fn new() -> Self {
        Self::with_leaf_spec(
            CertSpec::packed_leaf().with_extension(FIDO_AAGUID_OID, false, aaguid_extension(&AAGUID)),
        )
    }

    pub fn with_leaf_spec(spec: CertSpec) -> Self {
        let ca = TestCa::new("Attesta Test Root");
        let attestation_key = TestKey::es256();
        let leaf = ca.issue(&spec, &attestation_key);
        Self {
            registration: Registration::es256(),
            ca,
            attestation_key,
            leaf,
        }
    }

    pub fn request(&self) -> RegistrationRequest {
        self.registration
            .packed_full_request(&self.attestation_key, &[&self.leaf])
    }

    /// x5c carrying the root as well as the leaf.
    pub fn full_chain_request(&self) -> RegistrationRequest {
        self.registration
            .packed_full_request(&self.attestation_key, &[&self.leaf, &self.ca.cert])
    }

    pub fn anchors(&self) -> std::sync::Arc<attesta_core::InMemoryTrustAnchorRepository> {
        let repository = attesta_core::InMemoryTrustAnchorRepository::new();
        repository.add_global(self.ca.cert.clone());
        std::sync::Arc::new(repository)
    }
}

pub fn manager_with(
    settings: &attesta_core::VerifierSettings,
    repository: std::sync::Arc<dyn attesta_core::TrustAnchorRepository>,
) -> attesta_core::WebAuthnManager {
    attesta_core::WebAuthnManager::new(attesta_core::WebAuthnManagerConfig::from_settings(
        settings, repository,
    ))
}
