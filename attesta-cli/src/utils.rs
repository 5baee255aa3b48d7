//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use attesta_core::codec::base64url;
use attesta_core::data::{Aaguid, AttestedCredentialData, AuthenticatorFlags, CoseKey};
use attesta_core::{Challenge, CoreCredentialRecord, Origin, ServerProperty};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::exit_codes::ConfigError;
use crate::RelyingParty;

/// Read a response JSON file.
pub async fn read_response(path: &Path) -> Result<String> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = json.len(), "Read response");
    Ok(json)
}

/// Build the server property from command-line relying party settings.
pub fn server_property(rp: &RelyingParty) -> Result<ServerProperty> {
    let origins = rp
        .origins
        .iter()
        .map(|o| Origin::new(o.as_str()).map_err(|e| ConfigError(format!("Invalid origin {o}: {e}"))))
        .collect::<Result<Vec<_>, _>>()?;
    let challenge = Challenge::from_base64url(&rp.challenge)
        .map_err(|e| ConfigError(format!("Invalid challenge: {e}")))?;

    let mut origins = origins.into_iter();
    let first = origins
        .next()
        .ok_or_else(|| ConfigError("At least one --origin is required".into()))?;
    Ok(ServerProperty::new(first.clone(), rp.rp_id.as_str(), challenge)
        .with_origins(std::iter::once(first).chain(origins)))
}

/// Credential record as persisted by `verify-registration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    pub credential_id: String,
    pub aaguid: String,
    /// COSE_Key, base64url
    pub public_key: String,
    pub counter: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_eligible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_state: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv_initialized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
}

impl StoredCredential {
    pub fn from_record(record: &CoreCredentialRecord) -> Self {
        let attested = record.attested_credential_data();
        Self {
            credential_id: base64url::encode(record.credential_id()),
            aaguid: attested.aaguid().to_string(),
            public_key: base64url::encode(attested.credential_public_key().as_bytes()),
            counter: record.counter(),
            transports: record.transports().iter().map(|t| t.to_string()).collect(),
            backup_eligible: record.backup_eligible(),
            backup_state: record.backup_state(),
            uv_initialized: record.uv_initialized(),
            format: record.attestation_format().map(|f| f.to_string()),
            registered_at: Some(Utc::now()),
        }
    }

    pub fn to_record(&self) -> Result<CoreCredentialRecord> {
        let credential_id =
            base64url::decode(&self.credential_id).context("Failed to parse credentialId")?;
        let aaguid: Aaguid = self.aaguid.parse().context("Failed to parse aaguid")?;
        let public_key = base64url::decode(&self.public_key)
            .and_then(|bytes| CoseKey::from_bytes(&bytes))
            .context("Failed to parse publicKey")?;

        let mut record = CoreCredentialRecord::new(
            AttestedCredentialData::new(aaguid, &credential_id, public_key),
            self.counter,
        )
        .with_transports(self.transports.iter().map(|t| t.as_str().into()));
        if let Some(eligible) = self.backup_eligible {
            record = record.with_backup_flags(eligible, self.backup_state.unwrap_or(false));
        }
        if let Some(uv) = self.uv_initialized {
            record = record.with_uv_initialized(uv);
        }
        if let Some(format) = &self.format {
            record = record.with_attestation_format(format.parse().context("Failed to parse format")?);
        }
        Ok(record)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read credential file: {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse credential file: {}", path.display()))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize credential")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write credential file: {}", path.display()))?;
        debug!(path = %path.display(), "Saved credential");
        Ok(())
    }
}

/// Render authenticator flags as `UP UV BE ...`.
pub fn format_flags(flags: AuthenticatorFlags) -> String {
    [
        (flags.user_present(), "UP"),
        (flags.user_verified(), "UV"),
        (flags.backup_eligible(), "BE"),
        (flags.backup_state(), "BS"),
        (flags.attested_credential_data(), "AT"),
        (flags.extension_data(), "ED"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect::<Vec<_>>()
    .join(" ")
}

/// Print a boxed banner in the given state.
pub fn banner(title: &str, ok: bool) {
    let line = "╔════════════════════════════════════════╗";
    let body = format!("║{title:^40}║");
    let bottom = "╚════════════════════════════════════════╝";
    println!();
    if ok {
        println!("{}", line.green());
        println!("{}", body.green().bold());
        println!("{}", bottom.green());
    } else {
        println!("{}", line.red());
        println!("{}", body.red().bold());
        println!("{}", bottom.red());
    }
    println!();
}

/// Print one `label value` row.
pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("   {} {}", format!("{label}:").dimmed(), value);
}
