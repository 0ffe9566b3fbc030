//! Storage boundary for compiled module artifacts.
//!
//! Persisting uploaded `.wasm` bytes to durable storage is a deployment
//! concern external to this crate; [`ArtifactStore`] is the seam a
//! container implementation plugs a real backend into. [`FsArtifactStore`]
//! is a minimal filesystem-backed default suitable for local development
//! and single-node deployments.

use std::path::PathBuf;

use stormstack_core::{ModuleError, Result, StormError};
use tracing::debug;

/// Durable storage for compiled module artifacts, keyed by
/// `(name, version)`.
pub trait ArtifactStore: Send + Sync {
    /// Store an artifact's bytes under `name`/`version`, overwriting any
    /// existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::Module`] if the write fails.
    fn put(&self, name: &str, version: &str, bytes: &[u8]) -> Result<()>;

    /// Load a previously stored artifact's bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::NotFound`] if no artifact is stored under
    /// `name`/`version`.
    fn get(&self, name: &str, version: &str) -> Result<Vec<u8>>;

    /// Whether an artifact is stored under `name`/`version`.
    fn exists(&self, name: &str, version: &str) -> bool;

    /// Remove a stored artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::NotFound`] if no artifact is stored under
    /// `name`/`version`.
    fn remove(&self, name: &str, version: &str) -> Result<()>;
}

/// Filesystem-backed [`ArtifactStore`]: one file per `(name, version)`
/// pair under a base directory, named `{name}-{version}.wasm`.
pub struct FsArtifactStore {
    base_dir: PathBuf,
}

impl FsArtifactStore {
    /// Create a store rooted at `base_dir`. The directory is created on
    /// first write, not at construction time.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, name: &str, version: &str) -> PathBuf {
        self.base_dir.join(format!("{name}-{version}.wasm"))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, name: &str, version: &str, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir).map_err(|e| {
            StormError::Module(ModuleError::ManifestMismatch(format!(
                "failed to create artifact directory {}: {e}",
                self.base_dir.display()
            )))
        })?;
        let path = self.path_for(name, version);
        std::fs::write(&path, bytes).map_err(|e| {
            StormError::Module(ModuleError::ManifestMismatch(format!(
                "failed to write artifact {}: {e}",
                path.display()
            )))
        })?;
        debug!("stored artifact {}@{} at {}", name, version, path.display());
        Ok(())
    }

    fn get(&self, name: &str, version: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name, version);
        std::fs::read(&path)
            .map_err(|_| StormError::Module(ModuleError::NotFound(format!("{name}@{version}"))))
    }

    fn exists(&self, name: &str, version: &str) -> bool {
        self.path_for(name, version).is_file()
    }

    fn remove(&self, name: &str, version: &str) -> Result<()> {
        let path = self.path_for(name, version);
        std::fs::remove_file(&path)
            .map_err(|_| StormError::Module(ModuleError::NotFound(format!("{name}@{version}"))))
    }
}

/// In-memory [`ArtifactStore`] used by tests and in-process tooling that
/// never touches disk.
#[derive(Default)]
pub struct MemoryArtifactStore {
    entries: parking_lot::RwLock<std::collections::HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, version: &str) -> String {
        format!("{name}@{version}")
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, name: &str, version: &str, bytes: &[u8]) -> Result<()> {
        self.entries
            .write()
            .insert(Self::key(name, version), bytes.to_vec());
        Ok(())
    }

    fn get(&self, name: &str, version: &str) -> Result<Vec<u8>> {
        self.entries
            .read()
            .get(&Self::key(name, version))
            .cloned()
            .ok_or_else(|| StormError::Module(ModuleError::NotFound(Self::key(name, version))))
    }

    fn exists(&self, name: &str, version: &str) -> bool {
        self.entries.read().contains_key(&Self::key(name, version))
    }

    fn remove(&self, name: &str, version: &str) -> Result<()> {
        self.entries
            .write()
            .remove(&Self::key(name, version))
            .map(|_| ())
            .ok_or_else(|| StormError::Module(ModuleError::NotFound(Self::key(name, version))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryArtifactStore::new();
        assert!(!store.exists("combat", "1.0.0"));

        store.put("combat", "1.0.0", b"\0asm...").unwrap();
        assert!(store.exists("combat", "1.0.0"));
        assert_eq!(store.get("combat", "1.0.0").unwrap(), b"\0asm...".to_vec());
    }

    #[test]
    fn memory_store_get_missing_fails() {
        let store = MemoryArtifactStore::new();
        assert!(matches!(
            store.get("missing", "1.0.0"),
            Err(StormError::Module(ModuleError::NotFound(_)))
        ));
    }

    #[test]
    fn memory_store_remove() {
        let store = MemoryArtifactStore::new();
        store.put("combat", "1.0.0", b"bytes").unwrap();
        store.remove("combat", "1.0.0").unwrap();
        assert!(!store.exists("combat", "1.0.0"));
    }

    #[test]
    fn memory_store_remove_missing_fails() {
        let store = MemoryArtifactStore::new();
        assert!(store.remove("missing", "1.0.0").is_err());
    }

    #[test]
    fn fs_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!(
            "stormstack-artifact-test-{}",
            std::process::id()
        ));
        let store = FsArtifactStore::new(&dir);

        store.put("combat", "1.0.0", b"\0asm...").unwrap();
        assert!(store.exists("combat", "1.0.0"));
        assert_eq!(store.get("combat", "1.0.0").unwrap(), b"\0asm...".to_vec());

        store.remove("combat", "1.0.0").unwrap();
        assert!(!store.exists("combat", "1.0.0"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
