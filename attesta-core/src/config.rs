//! Verifier configuration
//!
//! Handles loading verification policy from environment variables with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Verification policy loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierSettings {
    /// Accept self attestation (default: true)
    pub allow_self_attestation: bool,
    /// Reject x5c chains that already contain a trust anchor (default: false)
    pub full_chain_prohibited: bool,
    /// Skip X.509 validity-period checks during path validation (default: false)
    pub skip_certificate_time_checks: bool,
    /// android-key: only honour TEE-enforced authorizations (default: false)
    pub android_tee_enforced_only: bool,
    /// android-safetynet: allowed future skew of `timestampMs` (default: 60s)
    pub safetynet_clock_skew: Duration,
    /// PEM file or directory of trust anchors (default: none)
    pub trust_anchors: Option<PathBuf>,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            allow_self_attestation: true,
            full_chain_prohibited: false,
            skip_certificate_time_checks: false,
            android_tee_enforced_only: false,
            safetynet_clock_skew: Duration::from_secs(60),
            trust_anchors: None,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl VerifierSettings {
    /// Load settings from `ATTESTA_*` environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |name: &str, default: bool| {
            var(name)
                .and_then(|v| parse_flag(&v))
                .unwrap_or(default)
        };

        let safetynet_clock_skew = var("ATTESTA_SAFETYNET_CLOCK_SKEW_SECS")
            .and_then(|v| v.trim().parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.safetynet_clock_skew);

        let trust_anchors = var("ATTESTA_TRUST_ANCHORS")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            allow_self_attestation: flag(
                "ATTESTA_ALLOW_SELF_ATTESTATION",
                defaults.allow_self_attestation,
            ),
            full_chain_prohibited: flag(
                "ATTESTA_FULL_CHAIN_PROHIBITED",
                defaults.full_chain_prohibited,
            ),
            skip_certificate_time_checks: flag(
                "ATTESTA_SKIP_CERT_TIME_CHECKS",
                defaults.skip_certificate_time_checks,
            ),
            android_tee_enforced_only: flag(
                "ATTESTA_ANDROID_TEE_ONLY",
                defaults.android_tee_enforced_only,
            ),
            safetynet_clock_skew,
            trust_anchors,
        }
    }
}
