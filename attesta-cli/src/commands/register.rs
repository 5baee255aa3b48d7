//! verify-registration command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use attesta_core::codec::base64url;
use attesta_core::data::CoseAlgorithm;
use attesta_core::{
    CoreCredentialRecord, InMemoryTrustAnchorRepository, PublicKeyCredentialParameters,
    RegistrationParameters, VerifierSettings, WebAuthnManager, WebAuthnManagerConfig,
};
use serde_json::json;
use tracing::{error, info};

use crate::exit_codes::ConfigError;
use crate::utils::{self, StoredCredential};
use crate::RelyingParty;

pub struct Options {
    pub response: PathBuf,
    pub rp: RelyingParty,
    pub trust_anchors: Option<PathBuf>,
    pub non_strict: bool,
    pub algorithms: Vec<String>,
    pub save_credential: Option<PathBuf>,
    pub json: bool,
}

fn build_manager(settings: &VerifierSettings, non_strict: bool) -> Result<WebAuthnManager> {
    if non_strict {
        return Ok(WebAuthnManager::non_strict());
    }

    let anchors = InMemoryTrustAnchorRepository::new();
    if let Some(path) = &settings.trust_anchors {
        let loaded = anchors
            .load(path)
            .with_context(|| format!("Failed to load trust anchors: {}", path.display()))?;
        info!(path = %path.display(), anchors = loaded, "Loaded trust anchors");
    }
    Ok(WebAuthnManager::new(WebAuthnManagerConfig::from_settings(
        settings,
        Arc::new(anchors),
    )))
}

fn parse_algorithms(names: &[String]) -> Result<Vec<PublicKeyCredentialParameters>> {
    names
        .iter()
        .map(|name| {
            CoseAlgorithm::from_name(name)
                .map(PublicKeyCredentialParameters::new)
                .ok_or_else(|| ConfigError(format!("Unknown algorithm: {name}")).into())
        })
        .collect()
}

/// Execute the verify-registration command.
pub async fn execute(options: Options) -> Result<()> {
    let mut settings = VerifierSettings::from_env();
    if options.trust_anchors.is_some() {
        settings.trust_anchors = options.trust_anchors.clone();
    }

    let manager = build_manager(&settings, options.non_strict)?;
    let mut parameters = RegistrationParameters::new(utils::server_property(&options.rp)?)
        .with_user_verification_required(options.rp.require_uv);
    let algorithms = parse_algorithms(&options.algorithms)?;
    if !algorithms.is_empty() {
        parameters = parameters.with_pub_key_cred_params(algorithms);
    }

    let json = utils::read_response(&options.response).await?;
    let data = manager
        .parse_registration_response_json(&json)
        .context("Failed to parse registration response")?;

    // The verifier reports the attestation type the façade drops
    let verified = match manager.registration_verifier().verify(&data, &parameters) {
        Ok(verified) => verified,
        Err(err) => {
            error!(code = err.error_code(), "Registration rejected");
            if !options.json {
                utils::banner("REJECTED", false);
                utils::field("Reason", err.to_string());
            }
            return Err(err).context("Registration verification failed");
        }
    };

    let record = CoreCredentialRecord::from_registration(&data)
        .context("Registration carried no credential")?;
    let attested = record.attested_credential_data();
    let algorithm = attested.credential_public_key().algorithm();
    info!(
        format = %data.attestation_object().format(),
        attestation_type = %verified.attestation_type,
        "Registration verified"
    );

    if options.json {
        let summary = json!({
            "verified": true,
            "credentialId": base64url::encode(record.credential_id()),
            "aaguid": attested.aaguid().to_string(),
            "format": data.attestation_object().format().as_str(),
            "attestationType": verified.attestation_type.as_str(),
            "algorithm": algorithm.name(),
            "counter": record.counter(),
            "trustPathLength": verified.trust_path.len(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        utils::banner("REGISTERED", true);
        utils::field("Credential ID", base64url::encode(record.credential_id()));
        utils::field("AAGUID", attested.aaguid());
        utils::field("Format", data.attestation_object().format());
        utils::field("Attestation", verified.attestation_type);
        utils::field("Algorithm", algorithm);
        utils::field("Counter", record.counter());
        utils::field(
            "Flags",
            utils::format_flags(data.attestation_object().authenticator_data().flags()),
        );
    }

    if let Some(path) = &options.save_credential {
        StoredCredential::from_record(&record).save(path).await?;
        if !options.json {
            utils::field("Saved to", path.display());
        }
    }

    Ok(())
}
