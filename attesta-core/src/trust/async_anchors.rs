//! Non-blocking trust anchor resolution.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use openssl::x509::X509;
use tracing::debug;

use super::anchors::{
    has_pem_extension, merge_unique, parse_pem, InMemoryTrustAnchorRepository, TrustAnchorError,
    TrustAnchorQuery, TrustAnchorRepository,
};

/// Resolves trust anchors without blocking the executor.
#[async_trait]
pub trait AsyncTrustAnchorRepository: Send + Sync {
    async fn find(&self, query: &TrustAnchorQuery) -> Result<Vec<X509>, TrustAnchorError>;
}

#[async_trait]
impl AsyncTrustAnchorRepository for InMemoryTrustAnchorRepository {
    async fn find(&self, query: &TrustAnchorQuery) -> Result<Vec<X509>, TrustAnchorError> {
        Ok(TrustAnchorRepository::find(self, query))
    }
}

/// Reads a trust anchor root (see [`super::anchors`] for the layout) on every lookup,
/// so anchors dropped into the directory take effect without a restart.
#[derive(Debug, Clone)]
pub struct DirectoryTrustAnchorRepository {
    root: PathBuf,
}

impl DirectoryTrustAnchorRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_scope_dir(dir: &Path) -> Result<Vec<X509>, TrustAnchorError> {
        let io_err = |source| TrustAnchorError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if has_pem_extension(&path) && entry.file_type().await.map_err(io_err)?.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut certs = Vec::new();
        for path in paths {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|source| TrustAnchorError::Io {
                    path: path.clone(),
                    source,
                })?;
            certs.extend(parse_pem(&path, &bytes)?);
        }
        Ok(certs)
    }
}

#[async_trait]
impl AsyncTrustAnchorRepository for DirectoryTrustAnchorRepository {
    async fn find(&self, query: &TrustAnchorQuery) -> Result<Vec<X509>, TrustAnchorError> {
        let mut found = Vec::new();
        for scope in query.scopes() {
            let dir = scope.directory(&self.root);
            merge_unique(&mut found, Self::read_scope_dir(&dir).await?);
        }
        debug!(root = %self.root.display(), anchors = found.len(), "Read trust anchors");
        Ok(found)
    }
}
