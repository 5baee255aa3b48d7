//! Trust anchor storage and lookup
//!
//! Anchors are scoped: global anchors apply to every attestation, others only to a
//! given AAGUID, attestation-certificate key identifier or attestation type.
//!
//! On disk, a trust anchor root is laid out as:
//!
//! ```text
//! <root>/*.pem                         global
//! <root>/aaguid/<aaguid>/*.pem         per AAGUID (hyphenated, lowercase)
//! <root>/key-id/<hex>/*.pem            per SHA-1 key identifier (lowercase hex)
//! <root>/type/<attestation type>/*.pem per attestation type (basic, attca, anonca)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use openssl::x509::X509;
use thiserror::Error;
use tracing::{debug, info};

use crate::attestation::{AttestationType, CertificatePath, VerifiedAttestation};
use crate::data::{Aaguid, AttestationObject};
use crate::error::VerificationResult;

/// Trust anchor loading errors
#[derive(Error, Debug)]
pub enum TrustAnchorError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid PEM in {path}: {message}")]
    Pem { path: PathBuf, message: String },
}

/// What the registration pipeline knows when it looks up anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchorQuery {
    /// `None` for the all-zero AAGUID.
    pub aaguid: Option<Aaguid>,
    /// SHA-1 of the leaf's subjectPublicKey.
    pub attestation_certificate_key_identifier: Option<Vec<u8>>,
    pub attestation_type: AttestationType,
}

impl TrustAnchorQuery {
    pub fn new(attestation_type: AttestationType) -> Self {
        Self {
            aaguid: None,
            attestation_certificate_key_identifier: None,
            attestation_type,
        }
    }

    pub fn with_aaguid(mut self, aaguid: Aaguid) -> Self {
        self.aaguid = (!aaguid.is_zero()).then_some(aaguid);
        self
    }

    pub fn with_key_identifier(mut self, key_identifier: Vec<u8>) -> Self {
        self.attestation_certificate_key_identifier = Some(key_identifier);
        self
    }

    /// Build the query for a verified attestation.
    pub fn for_attestation(
        object: &AttestationObject,
        verified: &VerifiedAttestation,
    ) -> VerificationResult<Self> {
        let mut query = Self::new(verified.attestation_type);
        if let Some(data) = object.authenticator_data().attested_credential_data() {
            query = query.with_aaguid(data.aaguid());
        }
        if let Some(leaf) = verified.trust_path.leaf() {
            query = query.with_key_identifier(leaf.key_identifier()?);
        }
        Ok(query)
    }

    /// Scopes that apply to this query, most general first.
    pub fn scopes(&self) -> Vec<AnchorScope> {
        let mut scopes = vec![
            AnchorScope::Global,
            AnchorScope::AttestationType(self.attestation_type),
        ];
        if let Some(aaguid) = self.aaguid {
            scopes.push(AnchorScope::Aaguid(aaguid));
        }
        if let Some(key_id) = &self.attestation_certificate_key_identifier {
            scopes.push(AnchorScope::KeyIdentifier(key_id.clone()));
        }
        scopes
    }
}

/// Where an anchor applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnchorScope {
    Global,
    Aaguid(Aaguid),
    KeyIdentifier(Vec<u8>),
    AttestationType(AttestationType),
}

impl AnchorScope {
    /// Directory holding this scope's PEM files under a trust anchor root.
    pub fn directory(&self, root: &Path) -> PathBuf {
        match self {
            Self::Global => root.to_path_buf(),
            Self::Aaguid(aaguid) => root.join("aaguid").join(aaguid.to_string()),
            Self::KeyIdentifier(key_id) => root.join("key-id").join(hex::encode(key_id)),
            Self::AttestationType(t) => root.join("type").join(t.as_str()),
        }
    }
}

/// Resolves trust anchors for an attestation.
pub trait TrustAnchorRepository: Send + Sync {
    fn find(&self, query: &TrustAnchorQuery) -> Vec<X509>;
}

pub(crate) fn has_pem_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("pem" | "crt" | "cer")
    )
}

fn is_pem_file(path: &Path) -> bool {
    path.is_file() && has_pem_extension(path)
}

pub(crate) fn parse_pem(path: &Path, bytes: &[u8]) -> Result<Vec<X509>, TrustAnchorError> {
    X509::stack_from_pem(bytes).map_err(|e| TrustAnchorError::Pem {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Append `certs` to `into`, skipping certificates already present.
pub(crate) fn merge_unique(into: &mut Vec<X509>, certs: impl IntoIterator<Item = X509>) {
    for cert in certs {
        let der = cert.to_der().ok();
        if !into.iter().any(|c| c.to_der().ok() == der) {
            into.push(cert);
        }
    }
}

/// Anchors held in memory; safe to extend while verifications are running.
#[derive(Default)]
pub struct InMemoryTrustAnchorRepository {
    anchors: DashMap<AnchorScope, Vec<X509>>,
}

impl InMemoryTrustAnchorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, scope: AnchorScope, anchor: X509) {
        let mut entry = self.anchors.entry(scope).or_default();
        merge_unique(&mut entry, [anchor]);
    }

    pub fn add_global(&self, anchor: X509) {
        self.add(AnchorScope::Global, anchor);
    }

    /// Add every certificate in the chain, e.g. to pin an authenticator's own root.
    pub fn add_path(&self, scope: AnchorScope, path: &CertificatePath) {
        for cert in path.iter() {
            self.add(scope.clone(), cert.x509().clone());
        }
    }

    /// Add the certificates of one PEM file under `scope`.
    pub fn load_pem_file(&self, scope: AnchorScope, path: &Path) -> Result<usize, TrustAnchorError> {
        let bytes = fs::read(path).map_err(|source| TrustAnchorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let certs = parse_pem(path, &bytes)?;
        let count = certs.len();
        for cert in certs {
            self.add(scope.clone(), cert);
        }
        debug!(path = %path.display(), count, "Loaded trust anchors");
        Ok(count)
    }

    /// Load a PEM file as global anchors, or a trust anchor root directory.
    pub fn load(&self, path: &Path) -> Result<usize, TrustAnchorError> {
        if path.is_dir() {
            self.load_directory(path)
        } else {
            self.load_pem_file(AnchorScope::Global, path)
        }
    }

    /// Load a trust anchor root laid out as described in the module docs.
    pub fn load_directory(&self, root: &Path) -> Result<usize, TrustAnchorError> {
        let mut total = self.load_scope_dir(AnchorScope::Global, root)?;

        let scoped: [(&str, fn(&str) -> Option<AnchorScope>); 3] = [
            ("aaguid", scope_from_aaguid),
            ("key-id", scope_from_key_id),
            ("type", scope_from_type),
        ];
        for (subdir, to_scope) in scoped {
            let dir = root.join(subdir);
            if !dir.is_dir() {
                continue;
            }
            for entry in read_dir_sorted(&dir)? {
                let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if let Some(scope) = entry.is_dir().then(|| to_scope(name)).flatten() {
                    total += self.load_scope_dir(scope, &entry)?;
                }
            }
        }

        info!(root = %root.display(), total, "Trust anchor directory loaded");
        Ok(total)
    }

    fn load_scope_dir(&self, scope: AnchorScope, dir: &Path) -> Result<usize, TrustAnchorError> {
        let mut total = 0;
        for path in read_dir_sorted(dir)? {
            if is_pem_file(&path) {
                total += self.load_pem_file(scope.clone(), &path)?;
            }
        }
        Ok(total)
    }

    pub fn len(&self) -> usize {
        self.anchors.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn scope_from_aaguid(name: &str) -> Option<AnchorScope> {
    name.parse().ok().map(AnchorScope::Aaguid)
}

pub(crate) fn scope_from_key_id(name: &str) -> Option<AnchorScope> {
    hex::decode(name).ok().map(AnchorScope::KeyIdentifier)
}

pub(crate) fn scope_from_type(name: &str) -> Option<AnchorScope> {
    [
        AttestationType::Basic,
        AttestationType::AttCa,
        AttestationType::AnonCa,
    ]
    .into_iter()
    .find(|t| t.as_str() == name)
    .map(AnchorScope::AttestationType)
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, TrustAnchorError> {
    let io_err = |source| TrustAnchorError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    paths.sort();
    Ok(paths)
}

impl TrustAnchorRepository for InMemoryTrustAnchorRepository {
    fn find(&self, query: &TrustAnchorQuery) -> Vec<X509> {
        let mut found = Vec::new();
        for scope in query.scopes() {
            if let Some(anchors) = self.anchors.get(&scope) {
                merge_unique(&mut found, anchors.value().iter().cloned());
            }
        }
        found
    }
}

impl<T: TrustAnchorRepository + ?Sized> TrustAnchorRepository for std::sync::Arc<T> {
    fn find(&self, query: &TrustAnchorQuery) -> Vec<X509> {
        (**self).find(query)
    }
}

impl std::fmt::Debug for InMemoryTrustAnchorRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTrustAnchorRepository")
            .field("scopes", &self.anchors.len())
            .field("anchors", &self.len())
            .finish()
    }
}
