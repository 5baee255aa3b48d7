//! Exit codes following sysexits.h conventions.
//!
//! Scripts can tell a rejected ceremony apart from a bad invocation or an
//! unreadable file without parsing stderr.

use attesta_core::error::{DataConversionError, VerificationError, WebAuthnError};
use attesta_core::trust::TrustAnchorError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// The ceremony was rejected.
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Input file missing, unreadable or malformed.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Cannot write output file.
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Signature counter did not advance; the authenticator may be cloned.
/// Maps to EX_NOPERM from sysexits.h.
pub const CLONE_DETECTED: i32 = 77;

/// Invalid relying party settings or trust anchors.
/// Maps to EX_CONFIG from sysexits.h.
pub const CONFIG_ERROR: i32 = 78;

/// Invalid command-line configuration, reported with [`CONFIG_ERROR`].
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    #[cfg(test)]
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Typed causes win; context strings are the fallback
        let code = err.chain().find_map(classify).unwrap_or_else(|| {
            if message.contains("Failed to write") {
                IO_ERROR
            } else if message.contains("Failed to read") || message.contains("Failed to parse") {
                INPUT_ERROR
            } else {
                GENERAL_ERROR
            }
        });

        Self {
            code,
            message: Some(message),
        }
    }
}

fn classify(cause: &(dyn std::error::Error + 'static)) -> Option<i32> {
    if let Some(err) = cause.downcast_ref::<WebAuthnError>() {
        return Some(match err {
            WebAuthnError::Verification(e) => verification_code(e),
            WebAuthnError::DataConversion(_) => INPUT_ERROR,
        });
    }
    if let Some(err) = cause.downcast_ref::<VerificationError>() {
        return Some(verification_code(err));
    }
    if cause.is::<DataConversionError>() {
        return Some(INPUT_ERROR);
    }
    if cause.is::<TrustAnchorError>() || cause.is::<ConfigError>() {
        return Some(CONFIG_ERROR);
    }
    None
}

fn verification_code(err: &VerificationError) -> i32 {
    if err.is_possible_clone() {
        CLONE_DETECTED
    } else {
        VERIFICATION_FAILED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_success() {
        let exit = ExitCode::success();
        assert_eq!(exit.code, SUCCESS);
        assert!(exit.message.is_none());
    }

    #[test]
    fn test_error_keeps_message() {
        let exit = ExitCode::error(VERIFICATION_FAILED, "bad signature");
        assert_eq!(exit.code, 65);
        assert_eq!(exit.message.as_deref(), Some("bad signature"));
    }

    #[test]
    fn test_verification_failure() {
        let err = anyhow::Error::new(WebAuthnError::from(VerificationError::BadSignature))
            .context("Authentication rejected");
        assert_eq!(ExitCode::from_anyhow(&err).code, VERIFICATION_FAILED);
    }

    #[test]
    fn test_counter_regression_is_distinct() {
        let err = anyhow::Error::new(VerificationError::MaliciousCounterValue {
            stored: 5,
            presented: 5,
        });
        assert_eq!(ExitCode::from_anyhow(&err).code, CLONE_DETECTED);
    }

    #[test]
    fn test_config_error() {
        let err = anyhow::Error::new(ConfigError("invalid origin".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, CONFIG_ERROR);
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let err = std::fs::read("/nonexistent/attesta/response.json")
            .context("Failed to read file: /nonexistent/attesta/response.json")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);
    }

    #[test]
    fn test_unknown_error_is_general() {
        let err = anyhow::anyhow!("something odd");
        assert_eq!(ExitCode::from_anyhow(&err).code, GENERAL_ERROR);
    }
}
