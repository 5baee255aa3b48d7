//! CLI integration tests for attesta-cli.
//!
//! These tests run the actual binary against responses produced by a small
//! software authenticator and check outputs, exit codes, and file artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use attesta_core::codec::base64url;
use attesta_core::crypto::sha256;
use attesta_core::data::{CoseAlgorithm, CoseKey, CoseKeyParams};
use ciborium::value::Value;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

const RP_ID: &str = "example.com";
const ORIGIN: &str = "https://example.com";
const CHALLENGE: &[u8] = b"cli-test-challenge";
const CREDENTIAL_ID: &[u8] = b"cli-credential";

/// Get a Command for the attesta binary.
fn attesta() -> Command {
    Command::cargo_bin("attesta").unwrap()
}

/// Software authenticator holding one ES256 credential.
struct Authenticator {
    key: PKey<Private>,
}

impl Authenticator {
    fn new() -> Self {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        Self {
            key: PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap(),
        }
    }

    fn cose_key(&self) -> CoseKey {
        let public = PKey::public_key_from_der(&self.key.public_key_to_der().unwrap()).unwrap();
        let params = CoseKeyParams::from_pkey(&public).unwrap().unwrap();
        CoseKey::new(CoseAlgorithm::ES256, params).unwrap()
    }

    fn client_data(ceremony: &str, challenge: &[u8]) -> Vec<u8> {
        json!({
            "type": ceremony,
            "challenge": base64url::encode(challenge),
            "origin": ORIGIN,
        })
        .to_string()
        .into_bytes()
    }

    fn authenticator_data(&self, flags: u8, counter: u32, attested: bool) -> Vec<u8> {
        let mut data = sha256(RP_ID.as_bytes()).to_vec();
        data.push(flags);
        data.extend_from_slice(&counter.to_be_bytes());
        if attested {
            data.extend_from_slice(&[0u8; 16]);
            data.extend_from_slice(&(CREDENTIAL_ID.len() as u16).to_be_bytes());
            data.extend_from_slice(CREDENTIAL_ID);
            data.extend_from_slice(self.cose_key().as_bytes());
        }
        data
    }

    fn registration_response(&self, challenge: &[u8]) -> String {
        let object = Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text("none".into())),
            (Value::Text("attStmt".into()), Value::Map(vec![])),
            (
                Value::Text("authData".into()),
                Value::Bytes(self.authenticator_data(0x45, 0, true)),
            ),
        ]);
        let mut attestation_object = Vec::new();
        ciborium::ser::into_writer(&object, &mut attestation_object).unwrap();

        json!({
            "id": base64url::encode(CREDENTIAL_ID),
            "rawId": base64url::encode(CREDENTIAL_ID),
            "type": "public-key",
            "response": {
                "clientDataJSON": base64url::encode(&Self::client_data("webauthn.create", challenge)),
                "attestationObject": base64url::encode(&attestation_object),
                "transports": ["internal"],
            },
            "clientExtensionResults": {},
        })
        .to_string()
    }

    fn authentication_response(&self, counter: u32) -> String {
        let auth_data = self.authenticator_data(0x05, counter, false);
        let client_data = Self::client_data("webauthn.get", CHALLENGE);

        let mut signer = Signer::new(MessageDigest::sha256(), &self.key).unwrap();
        signer.update(&auth_data).unwrap();
        signer.update(&sha256(&client_data)).unwrap();
        let signature = signer.sign_to_vec().unwrap();

        json!({
            "id": base64url::encode(CREDENTIAL_ID),
            "rawId": base64url::encode(CREDENTIAL_ID),
            "type": "public-key",
            "response": {
                "clientDataJSON": base64url::encode(&client_data),
                "authenticatorData": base64url::encode(&auth_data),
                "signature": base64url::encode(&signature),
            },
            "clientExtensionResults": {},
        })
        .to_string()
    }
}

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn rp_args() -> Vec<String> {
    vec![
        "--rp-id".into(),
        RP_ID.into(),
        "--origin".into(),
        ORIGIN.into(),
        "--challenge".into(),
        base64url::encode(CHALLENGE),
    ]
}

/// Register the authenticator and return the credential record path.
fn register(dir: &TempDir, authenticator: &Authenticator) -> PathBuf {
    let response = write(dir, "registration.json", &authenticator.registration_response(CHALLENGE));
    let credential = dir.path().join("credential.json");
    attesta()
        .arg("verify-registration")
        .arg(&response)
        .args(rp_args())
        .arg("--save-credential")
        .arg(&credential)
        .assert()
        .success();
    credential
}

fn stored_counter(path: &Path) -> u64 {
    let record: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    record["counter"].as_u64().unwrap()
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    attesta()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("WebAuthn ceremony verification"))
        .stdout(predicate::str::contains("verify-registration"))
        .stdout(predicate::str::contains("verify-authentication"))
        .stdout(predicate::str::contains("inspect"));
}

#[test]
fn test_version_displays_version() {
    attesta()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("attesta"));
}

#[test]
fn test_help_shows_exit_codes() {
    attesta()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("77"));
}

#[test]
fn test_verify_registration_help_shows_options() {
    attesta()
        .args(["verify-registration", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--rp-id"))
        .stdout(predicate::str::contains("--trust-anchors"))
        .stdout(predicate::str::contains("--non-strict"))
        .stdout(predicate::str::contains("--save-credential"));
}

#[test]
fn test_missing_required_args() {
    attesta()
        .args(["verify-registration", "response.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--rp-id"));
}

// ============================================================================
// Registration Tests
// ============================================================================

#[test]
fn test_registration_saves_credential() {
    let dir = TempDir::new().unwrap();
    let authenticator = Authenticator::new();
    let credential = register(&dir, &authenticator);

    let record: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&credential).unwrap()).unwrap();
    assert_eq!(record["credentialId"], base64url::encode(CREDENTIAL_ID));
    assert_eq!(record["format"], "none");
    assert_eq!(record["counter"], 0);
    assert_eq!(record["transports"], json!(["internal"]));
}

#[test]
fn test_registration_json_output() {
    let dir = TempDir::new().unwrap();
    let response = write(&dir, "r.json", &Authenticator::new().registration_response(CHALLENGE));
    attesta()
        .args(["--json", "verify-registration"])
        .arg(&response)
        .args(rp_args())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"attestationType\": \"none\""))
        .stdout(predicate::str::contains("\"algorithm\": \"ES256\""));
}

#[test]
fn test_registration_wrong_challenge_fails() {
    let dir = TempDir::new().unwrap();
    let response = write(&dir, "r.json", &Authenticator::new().registration_response(b"other"));
    attesta()
        .arg("verify-registration")
        .arg(&response)
        .args(rp_args())
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Registration verification failed"));
}

#[test]
fn test_registration_algorithm_not_offered() {
    let dir = TempDir::new().unwrap();
    let response = write(&dir, "r.json", &Authenticator::new().registration_response(CHALLENGE));
    attesta()
        .arg("verify-registration")
        .arg(&response)
        .args(rp_args())
        .args(["--alg", "RS256"])
        .assert()
        .code(65);
}

#[test]
fn test_registration_unknown_algorithm_is_config_error() {
    let dir = TempDir::new().unwrap();
    let response = write(&dir, "r.json", &Authenticator::new().registration_response(CHALLENGE));
    attesta()
        .arg("verify-registration")
        .arg(&response)
        .args(rp_args())
        .args(["--alg", "ROT13"])
        .assert()
        .code(78)
        .stderr(predicate::str::contains("Unknown algorithm"));
}

#[test]
fn test_registration_invalid_origin_is_config_error() {
    let dir = TempDir::new().unwrap();
    let response = write(&dir, "r.json", &Authenticator::new().registration_response(CHALLENGE));
    attesta()
        .arg("verify-registration")
        .arg(&response)
        .args(["--rp-id", RP_ID, "--origin", "not an origin"])
        .args(["--challenge", &base64url::encode(CHALLENGE)])
        .assert()
        .code(78);
}

#[test]
fn test_registration_missing_trust_anchors_is_config_error() {
    let dir = TempDir::new().unwrap();
    let response = write(&dir, "r.json", &Authenticator::new().registration_response(CHALLENGE));
    attesta()
        .arg("verify-registration")
        .arg(&response)
        .args(rp_args())
        .arg("--trust-anchors")
        .arg(dir.path().join("missing.pem"))
        .assert()
        .code(78)
        .stderr(predicate::str::contains("Failed to load trust anchors"));
}

#[test]
fn test_registration_missing_file() {
    attesta()
        .args(["verify-registration", "/nonexistent/registration.json"])
        .args(rp_args())
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn test_registration_malformed_response() {
    let dir = TempDir::new().unwrap();
    let response = write(&dir, "r.json", r#"{"id": "x", "response": {}}"#);
    attesta()
        .arg("verify-registration")
        .arg(&response)
        .args(rp_args())
        .assert()
        .code(66);
}

// ============================================================================
// Authentication Tests
// ============================================================================

#[test]
fn test_authentication_updates_counter() {
    let dir = TempDir::new().unwrap();
    let authenticator = Authenticator::new();
    let credential = register(&dir, &authenticator);
    let response = write(&dir, "a.json", &authenticator.authentication_response(3));

    attesta()
        .arg("verify-authentication")
        .arg(&response)
        .arg("--credential")
        .arg(&credential)
        .args(rp_args())
        .arg("--update")
        .assert()
        .success()
        .stdout(predicate::str::contains("AUTHENTICATED"))
        .stdout(predicate::str::contains("0 -> 3"));
    assert_eq!(stored_counter(&credential), 3);
}

#[test]
fn test_authentication_without_update_leaves_record() {
    let dir = TempDir::new().unwrap();
    let authenticator = Authenticator::new();
    let credential = register(&dir, &authenticator);
    let response = write(&dir, "a.json", &authenticator.authentication_response(8));

    attesta()
        .args(["--json", "verify-authentication"])
        .arg(&response)
        .arg("--credential")
        .arg(&credential)
        .args(rp_args())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"counter\": 8"));
    assert_eq!(stored_counter(&credential), 0);
}

#[test]
fn test_authentication_replay_detected() {
    let dir = TempDir::new().unwrap();
    let authenticator = Authenticator::new();
    let credential = register(&dir, &authenticator);
    let response = write(&dir, "a.json", &authenticator.authentication_response(5));

    let verify = || {
        let mut cmd = attesta();
        cmd.arg("verify-authentication")
            .arg(&response)
            .arg("--credential")
            .arg(&credential)
            .args(rp_args())
            .arg("--update");
        cmd
    };
    verify().assert().success();
    verify()
        .assert()
        .code(77)
        .stdout(predicate::str::contains("POSSIBLE CLONE"));
    assert_eq!(stored_counter(&credential), 5);
}

#[test]
fn test_authentication_wrong_key_fails() {
    let dir = TempDir::new().unwrap();
    let credential = register(&dir, &Authenticator::new());
    let response = write(&dir, "a.json", &Authenticator::new().authentication_response(1));

    attesta()
        .arg("verify-authentication")
        .arg(&response)
        .arg("--credential")
        .arg(&credential)
        .args(rp_args())
        .assert()
        .code(65);
}

#[test]
fn test_authentication_require_uv() {
    let dir = TempDir::new().unwrap();
    let authenticator = Authenticator::new();
    let credential = register(&dir, &authenticator);
    // UP|UV is set by the test authenticator, so this passes
    let response = write(&dir, "a.json", &authenticator.authentication_response(1));

    attesta()
        .arg("verify-authentication")
        .arg(&response)
        .arg("--credential")
        .arg(&credential)
        .args(rp_args())
        .arg("--require-uv")
        .assert()
        .success();
}

#[test]
fn test_authentication_missing_credential_file() {
    let dir = TempDir::new().unwrap();
    let response = write(&dir, "a.json", &Authenticator::new().authentication_response(1));
    attesta()
        .arg("verify-authentication")
        .arg(&response)
        .arg("--credential")
        .arg(dir.path().join("missing.json"))
        .args(rp_args())
        .assert()
        .code(66);
}

// ============================================================================
// Inspect Tests
// ============================================================================

#[test]
fn test_inspect_registration() {
    let dir = TempDir::new().unwrap();
    let response = write(&dir, "r.json", &Authenticator::new().registration_response(CHALLENGE));
    attesta()
        .args(["--json", "inspect"])
        .arg(&response)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ceremony\": \"registration\""))
        .stdout(predicate::str::contains("\"format\": \"none\""))
        .stdout(predicate::str::contains("\"coseAlgorithm\": -7"))
        .stdout(predicate::str::contains("UP UV AT"));
}

#[test]
fn test_inspect_authentication() {
    let dir = TempDir::new().unwrap();
    let response = write(&dir, "a.json", &Authenticator::new().authentication_response(12));
    attesta()
        .arg("inspect")
        .arg(&response)
        .assert()
        .success()
        .stdout(predicate::str::contains("authentication"))
        .stdout(predicate::str::contains("12"))
        .stdout(predicate::str::contains("webauthn.get"));
}

#[test]
fn test_inspect_does_not_verify() {
    let dir = TempDir::new().unwrap();
    // Wrong challenge is irrelevant for inspection
    let response = write(&dir, "r.json", &Authenticator::new().registration_response(b"anything"));
    attesta().arg("inspect").arg(&response).assert().success();
}

#[test]
fn test_inspect_garbage() {
    let dir = TempDir::new().unwrap();
    let response = write(&dir, "g.json", "definitely not json");
    attesta().arg("inspect").arg(&response).assert().code(66);
}
