//! Caller-supplied checks that run after the built-in pipeline has passed.
//!
//! Closures implement both traits, so a one-off rule does not need its own type:
//!
//! ```
//! use attesta_core::error::VerificationError;
//! use attesta_core::verifier::custom;
//!
//! let require_credprops = custom::registration(|data, _params| {
//!     if data.client_extensions().cred_props.is_none() {
//!         return Err(VerificationError::custom("credProps output is required"));
//!     }
//!     Ok(())
//! });
//! # let _ = require_credprops;
//! ```

use std::sync::Arc;

use crate::data::{
    AuthenticationData, AuthenticationParameters, RegistrationData, RegistrationParameters,
};
use crate::error::VerificationResult;

pub trait CustomRegistrationVerifier: Send + Sync {
    fn verify(
        &self,
        data: &RegistrationData,
        parameters: &RegistrationParameters,
    ) -> VerificationResult<()>;
}

pub trait CustomAuthenticationVerifier: Send + Sync {
    fn verify(
        &self,
        data: &AuthenticationData,
        parameters: &AuthenticationParameters,
    ) -> VerificationResult<()>;
}

impl<F> CustomRegistrationVerifier for F
where
    F: Fn(&RegistrationData, &RegistrationParameters) -> VerificationResult<()> + Send + Sync,
{
    fn verify(
        &self,
        data: &RegistrationData,
        parameters: &RegistrationParameters,
    ) -> VerificationResult<()> {
        self(data, parameters)
    }
}

impl<F> CustomAuthenticationVerifier for F
where
    F: Fn(&AuthenticationData, &AuthenticationParameters) -> VerificationResult<()> + Send + Sync,
{
    fn verify(
        &self,
        data: &AuthenticationData,
        parameters: &AuthenticationParameters,
    ) -> VerificationResult<()> {
        self(data, parameters)
    }
}

/// Wrap a closure as a registration verifier.
pub fn registration<F>(f: F) -> Arc<dyn CustomRegistrationVerifier>
where
    F: Fn(&RegistrationData, &RegistrationParameters) -> VerificationResult<()>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as an authentication verifier.
pub fn authentication<F>(f: F) -> Arc<dyn CustomAuthenticationVerifier>
where
    F: Fn(&AuthenticationData, &AuthenticationParameters) -> VerificationResult<()>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}
