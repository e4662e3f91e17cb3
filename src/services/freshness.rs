use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;

use crate::error::{CatalogError, Result};
use crate::model::catalog::fingerprint_bytes;

/// What a catalog file looked like when a caller loaded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub fingerprint: String,
}

impl Snapshot {
    pub fn take(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| CatalogError::io(path, e))?;
        Ok(Snapshot {
            path: path.to_path_buf(),
            modified: modified(path)?,
            fingerprint: fingerprint_bytes(&bytes),
        })
    }

    /// True when the file was rewritten with different content since the
    /// snapshot. A newer timestamp with identical bytes is not stale.
    pub fn is_stale(&self) -> Result<bool> {
        if modified(&self.path)? <= self.modified {
            return Ok(false);
        }
        let bytes = fs::read(&self.path).map_err(|e| CatalogError::io(&self.path, e))?;
        Ok(fingerprint_bytes(&bytes) != self.fingerprint)
    }
}

fn modified(path: &Path) -> Result<SystemTime> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| CatalogError::io(path, e))
}
