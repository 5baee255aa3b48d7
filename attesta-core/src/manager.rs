//! Public façade: parse raw ceremony input and run the matching pipeline.

use std::fmt;
use std::sync::Arc;

use crate::attestation::AttestationVerifiers;
use crate::codec;
use crate::config::VerifierSettings;
use crate::data::{
    AuthenticationData, AuthenticationParameters, AuthenticationRequest, RegistrationData,
    RegistrationParameters, RegistrationRequest,
};
use crate::error::Result;
use crate::trust::{
    CertPathTrustworthinessVerifier, CertPathValidator, DefaultCertPathTrustworthinessVerifier,
    DefaultSelfAttestationTrustworthinessVerifier, InMemoryTrustAnchorRepository,
    NullCertPathTrustworthinessVerifier, NullSelfAttestationTrustworthinessVerifier,
    SelfAttestationTrustworthinessVerifier, TrustAnchorRepository,
};
use crate::verifier::{
    AuthenticationDataVerifier, CustomAuthenticationVerifier, CustomRegistrationVerifier,
    RegistrationDataVerifier,
};

/// Everything a [`WebAuthnManager`] is built from.
///
/// The default is strict: every built-in format verifier, path validation against an
/// empty in-memory trust anchor repository, self attestation allowed, no custom
/// verifiers.
#[derive(Clone)]
pub struct WebAuthnManagerConfig {
    pub attestation_verifiers: AttestationVerifiers,
    pub cert_path_verifier: Arc<dyn CertPathTrustworthinessVerifier>,
    pub self_attestation_verifier: Arc<dyn SelfAttestationTrustworthinessVerifier>,
    pub custom_registration_verifiers: Vec<Arc<dyn CustomRegistrationVerifier>>,
    pub custom_authentication_verifiers: Vec<Arc<dyn CustomAuthenticationVerifier>>,
}

impl Default for WebAuthnManagerConfig {
    fn default() -> Self {
        Self::from_settings(
            &VerifierSettings::default(),
            Arc::new(InMemoryTrustAnchorRepository::new()),
        )
    }
}

impl WebAuthnManagerConfig {
    /// Strict configuration driven by `settings`, resolving anchors from `repository`.
    pub fn from_settings(
        settings: &VerifierSettings,
        repository: Arc<dyn TrustAnchorRepository>,
    ) -> Self {
        let cert_path_verifier = DefaultCertPathTrustworthinessVerifier::new(repository)
            .with_validator(cert_path_validator(settings));
        Self {
            attestation_verifiers: AttestationVerifiers::strict(settings),
            cert_path_verifier: Arc::new(cert_path_verifier),
            self_attestation_verifier: Arc::new(DefaultSelfAttestationTrustworthinessVerifier::new(
                settings.allow_self_attestation,
            )),
            custom_registration_verifiers: Vec::new(),
            custom_authentication_verifiers: Vec::new(),
        }
    }

    /// Accepts any attestation without evaluating it. Insecure.
    pub fn non_strict() -> Self {
        Self {
            attestation_verifiers: AttestationVerifiers::non_strict(),
            cert_path_verifier: Arc::new(NullCertPathTrustworthinessVerifier),
            self_attestation_verifier: Arc::new(NullSelfAttestationTrustworthinessVerifier),
            custom_registration_verifiers: Vec::new(),
            custom_authentication_verifiers: Vec::new(),
        }
    }

    pub fn with_custom_registration_verifier(
        mut self,
        verifier: Arc<dyn CustomRegistrationVerifier>,
    ) -> Self {
        self.custom_registration_verifiers.push(verifier);
        self
    }

    pub fn with_custom_authentication_verifier(
        mut self,
        verifier: Arc<dyn CustomAuthenticationVerifier>,
    ) -> Self {
        self.custom_authentication_verifiers.push(verifier);
        self
    }

    fn into_verifiers(self) -> (RegistrationDataVerifier, AuthenticationDataVerifier) {
        (
            RegistrationDataVerifier::new(
                self.attestation_verifiers,
                self.cert_path_verifier,
                self.self_attestation_verifier,
                self.custom_registration_verifiers,
            ),
            AuthenticationDataVerifier::new(self.custom_authentication_verifiers),
        )
    }
}

pub(crate) fn cert_path_validator(settings: &VerifierSettings) -> CertPathValidator {
    CertPathValidator {
        full_chain_prohibited: settings.full_chain_prohibited,
        skip_time_checks: settings.skip_certificate_time_checks,
    }
}

impl fmt::Debug for WebAuthnManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebAuthnManagerConfig")
            .field("attestation_verifiers", &self.attestation_verifiers)
            .field(
                "custom_registration_verifiers",
                &self.custom_registration_verifiers.len(),
            )
            .field(
                "custom_authentication_verifiers",
                &self.custom_authentication_verifiers.len(),
            )
            .finish()
    }
}

/// Verifies registration and authentication ceremonies.
///
/// Stateless and `Send + Sync`; share one instance across threads.
#[derive(Debug, Clone)]
pub struct WebAuthnManager {
    registration: RegistrationDataVerifier,
    authentication: AuthenticationDataVerifier,
}

impl Default for WebAuthnManager {
    fn default() -> Self {
        Self::new(WebAuthnManagerConfig::default())
    }
}

impl WebAuthnManager {
    pub fn new(config: WebAuthnManagerConfig) -> Self {
        let (registration, authentication) = config.into_verifiers();
        Self {
            registration,
            authentication,
        }
    }

    /// A manager that skips all attestation checks. Insecure; client data, rpId, flag,
    /// signature and counter checks still apply.
    pub fn non_strict() -> Self {
        Self::new(WebAuthnManagerConfig::non_strict())
    }

    pub fn registration_verifier(&self) -> &RegistrationDataVerifier {
        &self.registration
    }

    pub fn authentication_verifier(&self) -> &AuthenticationDataVerifier {
        &self.authentication
    }

    pub fn parse_registration_response_json(&self, json: &str) -> Result<RegistrationData> {
        Ok(codec::parse_registration_response_json(json)?)
    }

    pub fn parse_registration_request(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationData> {
        Ok(codec::parse_registration_request(request)?)
    }

    pub fn verify_registration(
        &self,
        data: RegistrationData,
        parameters: &RegistrationParameters,
    ) -> Result<RegistrationData> {
        self.registration.verify(&data, parameters)?;
        Ok(data)
    }

    pub fn verify_registration_request(
        &self,
        request: &RegistrationRequest,
        parameters: &RegistrationParameters,
    ) -> Result<RegistrationData> {
        let data = self.parse_registration_request(request)?;
        self.verify_registration(data, parameters)
    }

    pub fn verify_registration_response_json(
        &self,
        json: &str,
        parameters: &RegistrationParameters,
    ) -> Result<RegistrationData> {
        let data = self.parse_registration_response_json(json)?;
        self.verify_registration(data, parameters)
    }

    pub fn parse_authentication_response_json(&self, json: &str) -> Result<AuthenticationData> {
        Ok(codec::parse_authentication_response_json(json)?)
    }

    pub fn parse_authentication_request(
        &self,
        request: &AuthenticationRequest,
    ) -> Result<AuthenticationData> {
        Ok(codec::parse_authentication_request(request)?)
    }

    /// On success the caller should persist the presented sign count
    /// (see [`crate::data::CoreCredentialRecord::set_counter`]).
    pub fn verify_authentication(
        &self,
        data: AuthenticationData,
        parameters: &AuthenticationParameters,
    ) -> Result<AuthenticationData> {
        self.authentication.verify(&data, parameters)?;
        Ok(data)
    }

    pub fn verify_authentication_request(
        &self,
        request: &AuthenticationRequest,
        parameters: &AuthenticationParameters,
    ) -> Result<AuthenticationData> {
        let data = self.parse_authentication_request(request)?;
        self.verify_authentication(data, parameters)
    }

    pub fn verify_authentication_response_json(
        &self,
        json: &str,
        parameters: &AuthenticationParameters,
    ) -> Result<AuthenticationData> {
        let data = self.parse_authentication_response_json(json)?;
        self.verify_authentication(data, parameters)
    }
}

#[cfg(feature = "async")]
pub use self::non_blocking::AsyncWebAuthnManager;

#[cfg(feature = "async")]
mod non_blocking {
    use std::sync::Arc;

    use tracing::{debug, instrument, warn};

    use super::{cert_path_validator, WebAuthnManager, WebAuthnManagerConfig};
    use crate::config::VerifierSettings;
    use crate::data::{
        AuthenticationData, AuthenticationParameters, RegistrationData, RegistrationParameters,
    };
    use crate::error::{Result, VerificationError, VerificationResult};
    use crate::trust::{AsyncTrustAnchorRepository, CertPathValidator, TrustAnchorQuery};

    /// Registration with non-blocking trust anchor resolution.
    ///
    /// The pipeline and its order are those of [`WebAuthnManager`]; only the anchor
    /// lookup is awaited. Dropping the future mid-flight has no side effects.
    #[derive(Clone)]
    pub struct AsyncWebAuthnManager {
        inner: WebAuthnManager,
        trust_anchors: Arc<dyn AsyncTrustAnchorRepository>,
        validator: CertPathValidator,
    }

    impl AsyncWebAuthnManager {
        /// `config.cert_path_verifier` is bypassed: certificate paths are validated
        /// against anchors from `trust_anchors`.
        pub fn new(
            config: WebAuthnManagerConfig,
            trust_anchors: Arc<dyn AsyncTrustAnchorRepository>,
            settings: &VerifierSettings,
        ) -> Self {
            Self {
                inner: WebAuthnManager::new(config),
                trust_anchors,
                validator: cert_path_validator(settings),
            }
        }

        /// Strict manager built from `settings`.
        pub fn from_settings(
            settings: &VerifierSettings,
            trust_anchors: Arc<dyn AsyncTrustAnchorRepository>,
        ) -> Self {
            let config = WebAuthnManagerConfig::from_settings(
                settings,
                Arc::new(crate::trust::InMemoryTrustAnchorRepository::new()),
            );
            Self::new(config, trust_anchors, settings)
        }

        /// The synchronous manager sharing this one's verifiers.
        pub fn blocking(&self) -> &WebAuthnManager {
            &self.inner
        }

        #[instrument(
            level = "debug",
            skip_all,
            fields(
                rp_id = parameters.server_property().rp_id(),
                format = %data.attestation_object().format(),
            )
        )]
        pub async fn verify_registration(
            &self,
            data: RegistrationData,
            parameters: &RegistrationParameters,
        ) -> Result<RegistrationData> {
            match self.verify_registration_ordered(&data, parameters).await {
                Ok(()) => {
                    debug!("Registration verified");
                    Ok(data)
                }
                Err(err) => {
                    warn!(code = err.error_code(), error = %err, "Registration rejected");
                    Err(err.into())
                }
            }
        }

        async fn verify_registration_ordered(
            &self,
            data: &RegistrationData,
            parameters: &RegistrationParameters,
        ) -> VerificationResult<()> {
            let verifier = self.inner.registration_verifier();
            let verified = verifier.verify_attestation_statement(data, parameters)?;

            if verified.attestation_type.is_certificate_based() {
                let query = TrustAnchorQuery::for_attestation(data.attestation_object(), &verified)?;
                let anchors = self.trust_anchors.find(&query).await.map_err(|e| {
                    VerificationError::certificate(format!("trust anchor lookup failed: {e}"))
                })?;
                debug!(anchors = anchors.len(), "Resolved trust anchors");
                self.validator.validate(&verified.trust_path, &anchors)?;
            } else {
                verifier.verify_trustworthiness(data.attestation_object(), &verified)?;
            }

            verifier.run_custom_verifiers(data, parameters)
        }

        pub async fn verify_registration_response_json(
            &self,
            json: &str,
            parameters: &RegistrationParameters,
        ) -> Result<RegistrationData> {
            let data = self.inner.parse_registration_response_json(json)?;
            self.verify_registration(data, parameters).await
        }

        /// Authentication never touches trust anchors and runs synchronously.
        pub fn verify_authentication(
            &self,
            data: AuthenticationData,
            parameters: &AuthenticationParameters,
        ) -> Result<AuthenticationData> {
            self.inner.verify_authentication(data, parameters)
        }

        pub fn verify_authentication_response_json(
            &self,
            json: &str,
            parameters: &AuthenticationParameters,
        ) -> Result<AuthenticationData> {
            self.inner
                .verify_authentication_response_json(json, parameters)
        }
    }

    impl std::fmt::Debug for AsyncWebAuthnManager {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("AsyncWebAuthnManager")
                .field("inner", &self.inner)
                .field("validator", &self.validator)
                .finish()
        }
    }
}
