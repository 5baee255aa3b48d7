//! Registration pipeline tests: ordering, policy flags and the façade entry points.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use attesta_core::attestation::NullAttestationStatementVerifier;
use attesta_core::codec::base64url;
use attesta_core::data::{AttestationFormat, CoseAlgorithm, PublicKeyCredentialParameters};
use attesta_core::verifier::custom;
use attesta_core::{
    AttestationType, AttestationVerifiers, CoreCredentialRecord, InMemoryTrustAnchorRepository,
    RegistrationRequest, VerificationError, VerifierSettings, WebAuthnError, WebAuthnManager,
    WebAuthnManagerConfig,
};
use common::*;

fn verification_error(err: WebAuthnError) -> VerificationError {
    err.as_verification()
        .cloned()
        .unwrap_or_else(|| panic!("expected a verification error, got {err}"))
}

fn register(manager: &WebAuthnManager, request: &RegistrationRequest) -> Result<(), VerificationError> {
    manager
        .verify_registration_request(request, &registration_parameters())
        .map(|_| ())
        .map_err(verification_error)
}

#[test]
fn test_none_attestation_registers() {
    init_tracing();
    let registration = Registration::es256();
    let manager = WebAuthnManager::default();

    let data = manager
        .verify_registration_request(&registration.none_request(), &registration_parameters())
        .expect("none attestation should register");

    let record = CoreCredentialRecord::from_registration(&data).expect("Credential data present");
    assert_eq!(record.credential_id(), registration.credential_id.as_slice());
    assert_eq!(record.counter(), 0);
    assert_eq!(record.backup_eligible(), Some(false));
    assert_eq!(record.uv_initialized(), Some(true));
    assert_eq!(record.attestation_format(), Some(AttestationFormat::None));
}

#[test]
fn test_packed_self_attestation_type() {
    let registration = Registration::es256();
    let manager = WebAuthnManager::default();
    let data = manager
        .parse_registration_request(&registration.packed_self_request())
        .unwrap();

    let verified = manager
        .registration_verifier()
        .verify(&data, &registration_parameters())
        .expect("packed self attestation should verify");
    assert_eq!(verified.attestation_type, AttestationType::SelfAttestation);
    assert!(verified.trust_path.is_empty());
}

#[test]
fn test_self_attestation_policy() {
    let registration = Registration::es256();
    let settings = VerifierSettings {
        allow_self_attestation: false,
        ..VerifierSettings::default()
    };
    let manager = WebAuthnManager::new(WebAuthnManagerConfig::from_settings(
        &settings,
        Arc::new(InMemoryTrustAnchorRepository::new()),
    ));
    assert_eq!(
        register(&manager, &registration.packed_self_request()),
        Err(VerificationError::SelfAttestationProhibited)
    );
}

#[test]
fn test_client_data_failures() {
    let manager = WebAuthnManager::default();
    let cases = [
        (
            client_data_json("webauthn.get", CHALLENGE, ORIGIN),
            "INCONSISTENT_CLIENT_DATA_TYPE",
        ),
        (
            client_data_json("webauthn.create", b"stale-challenge", ORIGIN),
            "BAD_CHALLENGE",
        ),
        (
            client_data_json("webauthn.create", CHALLENGE, "https://evil.example"),
            "BAD_ORIGIN",
        ),
        (
            client_data_json("webauthn.create", CHALLENGE, "https://example.com:443"),
            "BAD_ORIGIN",
        ),
        (
            client_data_json("webauthn.create", CHALLENGE, "http://example.com"),
            "BAD_ORIGIN",
        ),
    ];

    for (client_data, code) in cases {
        let mut registration = Registration::es256();
        registration.client_data_json = client_data;
        let err = register(&manager, &registration.none_request()).unwrap_err();
        assert_eq!(err.error_code(), code);
    }
}

#[test]
fn test_rp_id_mismatch() {
    let mut registration = Registration::es256();
    registration.rp_id = "evil.example".to_string();
    assert_eq!(
        register(&WebAuthnManager::default(), &registration.none_request()),
        Err(VerificationError::BadRpId)
    );
}

#[test]
fn test_user_flags() {
    let manager = WebAuthnManager::default();

    let mut registration = Registration::es256();
    registration.flags = AT;
    assert_eq!(
        register(&manager, &registration.none_request()),
        Err(VerificationError::UserNotPresent)
    );

    registration.flags = UP | AT;
    let params = registration_parameters().with_user_verification_required(true);
    let err = manager
        .verify_registration_request(&registration.none_request(), &params)
        .unwrap_err();
    assert_eq!(verification_error(err), VerificationError::UserNotVerified);

    let params = registration_parameters().with_user_presence_required(false);
    registration.flags = AT;
    manager
        .verify_registration_request(&registration.none_request(), &params)
        .expect("UP not required");
}

/// Registration without attested credential data is a constraint violation
#[test]
fn test_missing_attested_credential_data() {
    let registration = Registration::es256();
    let auth_data = authenticator_data(RP_ID, UP | UV, 0, None);
    let object = attestation_object("none", vec![], &auth_data);
    let request = RegistrationRequest::new(&object, &registration.client_data_json);
    assert!(matches!(
        register(&WebAuthnManager::default(), &request),
        Err(VerificationError::ConstraintViolation(_))
    ));
}

#[test]
fn test_credential_id_length_limit() {
    let manager = WebAuthnManager::default();
    let mut registration = Registration::es256();

    registration.credential_id = vec![7; 1023];
    register(&manager, &registration.none_request()).expect("1023 bytes is allowed");

    registration.credential_id = vec![7; 1024];
    assert!(matches!(
        register(&manager, &registration.none_request()),
        Err(VerificationError::ConstraintViolation(_))
    ));
}

#[test]
fn test_backup_state_requires_eligibility() {
    let manager = WebAuthnManager::default();
    let mut registration = Registration::es256();

    registration.flags = UP | UV | AT | BS;
    assert!(matches!(
        register(&manager, &registration.none_request()),
        Err(VerificationError::IllegalBackupState(_))
    ));

    registration.flags = UP | UV | AT | BS | BE;
    register(&manager, &registration.none_request()).expect("BE|BS is consistent");
}

#[test]
fn test_algorithm_must_be_offered() {
    let registration = Registration::es256();
    let manager = WebAuthnManager::default();

    let params = registration_parameters()
        .with_pub_key_cred_params([PublicKeyCredentialParameters::new(CoseAlgorithm::RS256)]);
    let err = manager
        .verify_registration_request(&registration.none_request(), &params)
        .unwrap_err();
    assert_eq!(
        verification_error(err),
        VerificationError::BadAlgorithm(CoseAlgorithm::ES256.value())
    );

    let params = registration_parameters().with_pub_key_cred_params([
        PublicKeyCredentialParameters::new(CoseAlgorithm::RS256),
        PublicKeyCredentialParameters::new(CoseAlgorithm::ES256),
    ]);
    manager
        .verify_registration_request(&registration.none_request(), &params)
        .expect("ES256 is offered");
}

/// A known format with no configured verifier is rejected, not skipped
#[test]
fn test_format_without_verifier() {
    let registration = Registration::es256();
    let config = WebAuthnManagerConfig {
        attestation_verifiers: AttestationVerifiers::new()
            .with(NullAttestationStatementVerifier::new(AttestationFormat::None)),
        ..WebAuthnManagerConfig::default()
    };
    let manager = WebAuthnManager::new(config);

    register(&manager, &registration.none_request()).expect("none is configured");
    assert!(matches!(
        register(&manager, &registration.packed_self_request()),
        Err(VerificationError::UnsupportedAttestationFormat(_))
    ));
}

#[test]
fn test_unknown_format_is_conversion_error() {
    let registration = Registration::es256();
    let err = WebAuthnManager::default()
        .verify_registration_request(&registration.request("made-up", vec![]), &registration_parameters())
        .unwrap_err();
    assert!(matches!(err, WebAuthnError::DataConversion(_)));
}

/// Non-strict mode ignores the statement but still runs the protocol checks
#[test]
fn test_non_strict_manager() {
    let manager = WebAuthnManager::non_strict();
    let mut registration = Registration::es256();

    let bogus_sig = registration.request(
        "packed",
        vec![
            ("alg", alg(CoseAlgorithm::ES256)),
            ("sig", ciborium::value::Value::Bytes(vec![0; 8])),
        ],
    );
    register(&manager, &bogus_sig).expect("statement is not evaluated");

    registration.client_data_json = client_data_json("webauthn.create", b"other", ORIGIN);
    assert_eq!(
        register(&manager, &registration.none_request()),
        Err(VerificationError::BadChallenge)
    );
}

#[test]
fn test_custom_verifiers_run_last_in_order() {
    let calls = Arc::new(AtomicUsize::new(0));
    let first = {
        let calls = Arc::clone(&calls);
        custom::registration(move |_, _| {
            assert_eq!(calls.fetch_add(1, Ordering::SeqCst), 0);
            Ok(())
        })
    };
    let second = {
        let calls = Arc::clone(&calls);
        custom::registration(move |_, _| {
            assert_eq!(calls.fetch_add(1, Ordering::SeqCst), 1);
            Err(VerificationError::custom("enterprise policy"))
        })
    };
    let manager = WebAuthnManager::new(
        WebAuthnManagerConfig::default()
            .with_custom_registration_verifier(first)
            .with_custom_registration_verifier(second),
    );

    let registration = Registration::es256();
    assert_eq!(
        register(&manager, &registration.none_request()),
        Err(VerificationError::Custom("enterprise policy".into()))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Built-in failures stop the pipeline before custom verifiers
    let mut bad = Registration::es256();
    bad.rp_id = "other.example".into();
    assert_eq!(register(&manager, &bad.none_request()), Err(VerificationError::BadRpId));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_response_json_entry_point() {
    let registration = Registration::es256();
    let request = registration.packed_self_request();
    let json = serde_json::json!({
        "id": base64url::encode(&registration.credential_id),
        "rawId": base64url::encode(&registration.credential_id),
        "type": "public-key",
        "response": {
            "clientDataJSON": base64url::encode(&request.client_data_json),
            "attestationObject": base64url::encode(&request.attestation_object),
            "transports": ["usb", "nfc"],
        },
        "clientExtensionResults": { "credProps": { "rk": true } },
    })
    .to_string();

    let data = WebAuthnManager::default()
        .verify_registration_response_json(&json, &registration_parameters())
        .expect("JSON response should register");
    assert_eq!(data.credential_id(), Some(registration.credential_id.as_slice()));
    assert_eq!(data.transports().map(|t| t.len()), Some(2));
    assert_eq!(
        data.client_extensions().cred_props.as_ref().and_then(|p| p.rk),
        Some(true)
    );
}
