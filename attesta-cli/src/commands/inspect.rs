//! inspect command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use attesta_core::codec::{self, base64url};
use attesta_core::data::{AuthenticatorData, CollectedClientData};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::utils;

fn is_registration(json: &str) -> Result<bool> {
    let value: Value = serde_json::from_str(json).context("Failed to parse response JSON")?;
    Ok(value
        .get("response")
        .and_then(|r| r.get("attestationObject"))
        .is_some())
}

fn describe_authenticator_data(auth_data: &AuthenticatorData) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("rpIdHash".into(), hex::encode(auth_data.rp_id_hash()).into());
    fields.insert("flags".into(), utils::format_flags(auth_data.flags()).into());
    fields.insert("signCount".into(), auth_data.sign_count().into());
    if let Some(attested) = auth_data.attested_credential_data() {
        let key = attested.credential_public_key();
        fields.insert("aaguid".into(), attested.aaguid().to_string().into());
        fields.insert(
            "credentialId".into(),
            base64url::encode(attested.credential_id()).into(),
        );
        fields.insert("algorithm".into(), key.algorithm().name().into());
        fields.insert("coseAlgorithm".into(), key.algorithm().value().into());
    }
    if let Some(extensions) = auth_data.extensions() {
        let names: Vec<Value> = extensions.names().map(|n| n.to_string().into()).collect();
        fields.insert("extensions".into(), names.into());
    }
    fields
}

fn describe_client_data(client_data: &CollectedClientData) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("type".into(), client_data.ceremony_type().into());
    fields.insert("origin".into(), client_data.origin().into());
    fields.insert(
        "challenge".into(),
        base64url::encode(client_data.challenge()).into(),
    );
    if client_data.cross_origin() {
        fields.insert("crossOrigin".into(), true.into());
    }
    fields
}

/// Execute the inspect command.
pub async fn execute(file: PathBuf, json_output: bool) -> Result<()> {
    let json = utils::read_response(&file).await?;

    let summary = if is_registration(&json)? {
        debug!("Decoding registration response");
        let data = codec::parse_registration_response_json(&json)
            .context("Failed to parse registration response")?;
        let mut fields = describe_authenticator_data(data.attestation_object().authenticator_data());
        fields.insert("ceremony".into(), "registration".into());
        fields.insert("format".into(), data.attestation_object().format().as_str().into());
        fields.insert(
            "clientData".into(),
            describe_client_data(data.collected_client_data()).into(),
        );
        if let Some(transports) = data.transports() {
            let names: Vec<Value> = transports.iter().map(|t| t.to_string().into()).collect();
            fields.insert("transports".into(), names.into());
        }
        fields
    } else {
        debug!("Decoding authentication response");
        let data = codec::parse_authentication_response_json(&json)
            .context("Failed to parse authentication response")?;
        let mut fields = describe_authenticator_data(data.authenticator_data());
        fields.insert("ceremony".into(), "authentication".into());
        fields.insert(
            "credentialId".into(),
            base64url::encode(data.credential_id()).into(),
        );
        if let Some(handle) = data.user_handle() {
            fields.insert("userHandle".into(), base64url::encode(handle).into());
        }
        fields.insert(
            "clientData".into(),
            describe_client_data(data.collected_client_data()).into(),
        );
        fields
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    for (key, value) in &summary {
        match value {
            Value::Object(nested) => {
                for (inner, value) in nested {
                    utils::field(&format!("{key}.{inner}"), display(value));
                }
            }
            other => utils::field(key, display(other)),
        }
    }
    Ok(())
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}
