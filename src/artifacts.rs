//! Artifact Store: the directory of deliverable files.
//!
//! The store is a flat directory (the configured `output_dir`). Artifacts are
//! addressed by bare file name only; any name that could resolve outside the
//! root is refused before the file system is touched. Dot-prefixed names are
//! refused too, which keeps per-job scratch directories out of reach.

use crate::error::ArtifactError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A registered artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// An open artifact ready to be streamed to a client.
#[derive(Debug)]
pub struct ArtifactReader {
    pub name: String,
    pub size: u64,
    pub file: tokio::fs::File,
}

/// Directory-backed artifact table.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject anything that is not a bare, visible file name.
    pub fn validate_name(name: &str) -> Result<(), ArtifactError> {
        let invalid = name.is_empty()
            || name.starts_with('.')
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
            || name.contains('\0');
        if invalid {
            return Err(ArtifactError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    /// Location an artifact called `name` has (or would have) in the store.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        Self::validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Register the file at `path` under `name`, moving it under the root
    /// when it lives elsewhere.
    pub async fn put(&self, name: &str, path: &Path) -> Result<Artifact, ArtifactError> {
        let dest = self.path_for(name)?;
        if path != dest {
            tokio::fs::rename(path, &dest)
                .await
                .map_err(|source| ArtifactError::Io {
                    path: dest.clone(),
                    source,
                })?;
            debug!("Moved {} into the artifact store", path.display());
        }
        let size = tokio::fs::metadata(&dest)
            .await
            .map_err(|source| ArtifactError::Io {
                path: dest.clone(),
                source,
            })?
            .len();
        info!(artifact = %name, size, "Artifact registered");
        Ok(Artifact {
            name: name.to_string(),
            path: dest,
            size,
        })
    }

    /// Open an artifact for reading.
    pub async fn get(&self, name: &str) -> Result<ArtifactReader, ArtifactError> {
        let path = self.path_for(name)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(name.to_string()))
            }
            Err(source) => return Err(ArtifactError::Io { path, source }),
        };
        let meta = file
            .metadata()
            .await
            .map_err(|source| ArtifactError::Io {
                path: path.clone(),
                source,
            })?;
        if !meta.is_file() {
            return Err(ArtifactError::NotFound(name.to_string()));
        }
        Ok(ArtifactReader {
            name: name.to_string(),
            size: meta.len(),
            file,
        })
    }
}
