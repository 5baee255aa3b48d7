//! verify-authentication command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use attesta_core::{AuthenticationParameters, WebAuthnManager};
use serde_json::json;
use tracing::{error, info, warn};

use crate::utils::{self, StoredCredential};
use crate::RelyingParty;

/// Execute the verify-authentication command.
pub async fn execute(
    response: PathBuf,
    credential: PathBuf,
    rp: RelyingParty,
    update: bool,
    json_output: bool,
) -> Result<()> {
    let mut stored = StoredCredential::load(&credential).await?;
    let record = stored.to_record()?;
    let previous = record.counter();

    let parameters = AuthenticationParameters::new(utils::server_property(&rp)?, record)
        .with_user_verification_required(rp.require_uv);

    let json = utils::read_response(&response).await?;
    let manager = WebAuthnManager::default();
    let data = manager
        .parse_authentication_response_json(&json)
        .context("Failed to parse authentication response")?;

    if let Err(err) = manager.authentication_verifier().verify(&data, &parameters) {
        if err.is_possible_clone() {
            warn!(code = err.error_code(), "Signature counter did not advance");
        } else {
            error!(code = err.error_code(), "Authentication rejected");
        }
        if !json_output {
            utils::banner(if err.is_possible_clone() { "POSSIBLE CLONE" } else { "REJECTED" }, false);
            utils::field("Reason", err.to_string());
        }
        return Err(err).context("Authentication verification failed");
    }

    let auth_data = data.authenticator_data();
    let counter = auth_data.sign_count();
    info!(previous, counter, "Authentication verified");

    if update {
        stored.counter = counter;
        stored.backup_state = Some(auth_data.flags().backup_state());
        if auth_data.flags().user_verified() {
            stored.uv_initialized = Some(true);
        }
        stored.save(&credential).await?;
    }

    if json_output {
        let summary = json!({
            "verified": true,
            "credentialId": stored.credential_id,
            "previousCounter": previous,
            "counter": counter,
            "userVerified": auth_data.flags().user_verified(),
            "backupState": auth_data.flags().backup_state(),
            "updated": update,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        utils::banner("AUTHENTICATED", true);
        utils::field("Credential ID", &stored.credential_id);
        utils::field("Counter", format!("{previous} -> {counter}"));
        utils::field("Flags", utils::format_flags(auth_data.flags()));
        if update {
            utils::field("Updated", credential.display());
        }
    }

    Ok(())
}
