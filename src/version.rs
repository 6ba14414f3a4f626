//! System version marker
//!
//! A single `u64` persisted under the state directory. It participates in
//! every cache key, so bumping it strands all cached decisions at once
//! without touching the cache itself. Operators bump after curating the
//! corpus or changing the classification prompt; runtime learning appends
//! never bump.

use crate::config::ConfigError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

const FIRST_VERSION: u64 = 1;

/// Persisted system version with an atomic in-memory copy
#[derive(Debug)]
pub struct VersionMarker {
    path: PathBuf,
    current: AtomicU64,
}

impl VersionMarker {
    /// Load the persisted version; a missing marker means first boot and
    /// initializes to 1. Unparseable content is fatal: guessing a version
    /// would silently revive every stale cache entry.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();

        let current = match std::fs::read_to_string(&path) {
            Ok(content) => content.trim().parse::<u64>().map_err(|error| {
                ConfigError::StateLoad(format!(
                    "version marker {} is not a number: {error}",
                    path.display()
                ))
            })?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                std::fs::write(&path, format!("{FIRST_VERSION}\n"))?;
                info!(path = %path.display(), "Initialized version marker");
                FIRST_VERSION
            }
            Err(error) => return Err(error.into()),
        };

        Ok(Self {
            path,
            current: AtomicU64::new(current),
        })
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Increment and persist; returns the new version
    ///
    /// If the write fails the in-memory version stays ahead of disk. That
    /// is safe: entries keyed by the newer version simply miss after a
    /// restart.
    pub fn bump(&self) -> Result<u64, std::io::Error> {
        let next = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        std::fs::write(&self.path, format!("{next}\n"))?;
        info!(version = next, "System version bumped");
        Ok(next)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
