//! Staleness-aware cache of sidecar names.
//!
//! Keyed by sidecar path. An entry is trusted while its recorded mtime is
//! not older than the sidecar's current mtime, so a repeated request costs a
//! `stat` instead of an open+read+parse. Entries are never expired; the
//! whole cache is dropped when the gateway stops.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use dashmap::DashMap;
use serde::Deserialize;

use super::ResolveError;

/// Name and extension of an asset, as read from its sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetName {
    pub display_name: String,
    pub extension: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    name: AssetName,
    observed: SystemTime,
}

/// The two sidecar fields the gateway needs. Both are required.
#[derive(Deserialize)]
struct SidecarName {
    name: String,
    ext: String,
}

/// Thread-safe sidecar cache shared by all request workers.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: DashMap<PathBuf, CacheEntry>,
    /// Number of sidecar reads that went to disk.
    disk_reads: AtomicUsize,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a sidecar path to the asset's name and extension.
    pub fn resolve(&self, sidecar: &Path) -> Result<AssetName, ResolveError> {
        let meta = fs::metadata(sidecar).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ResolveError::NotFound,
            _ => ResolveError::Io(sidecar.to_path_buf(), e),
        })?;
        if !meta.is_file() {
            return Err(ResolveError::NotFound);
        }
        // Without an mtime every lookup is a miss
        let modified = meta.modified().ok();

        if let Some(modified) = modified
            && let Some(entry) = self.entries.get(sidecar)
            && entry.observed >= modified
        {
            crate::debug!("cache"; "hit: {}", sidecar.display());
            return Ok(entry.name.clone());
        }

        let name = self.read(sidecar)?;
        if let Some(observed) = modified {
            self.entries.insert(
                sidecar.to_path_buf(),
                CacheEntry {
                    name: name.clone(),
                    observed,
                },
            );
        }
        Ok(name)
    }

    fn read(&self, sidecar: &Path) -> Result<AssetName, ResolveError> {
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
        let content = fs::read(sidecar).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ResolveError::NotFound,
            _ => ResolveError::Io(sidecar.to_path_buf(), e),
        })?;
        let parsed: SidecarName = serde_json::from_slice(&content)
            .map_err(|e| ResolveError::Parse(sidecar.to_path_buf(), e))?;
        Ok(AssetName {
            display_name: parsed.name,
            extension: parsed.ext,
        })
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sidecar reads that missed the cache since creation.
    pub fn disk_reads(&self) -> usize {
        self.disk_reads.load(Ordering::Relaxed)
    }
}
