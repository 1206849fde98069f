//! Filesystem artifact store.
//!
//! Directory layout:
//!
//! ```text
//! <root>/
//!   experiments/<experiment_id>/model.bin
//!   experiments/<experiment_id>/metrics.json
//!   promoted/v<N>.bin
//!   promoted/v<N>_metrics.json
//!   current_model.txt        # "v<N>"
//! ```
//!
//! Write discipline:
//! - experiment records land in a staging directory and are published with a
//!   single rename, so model + metrics appear together or not at all
//! - version numbers are reserved with `create_new` on `v<N>.bin`; a losing
//!   racer sees `AlreadyExists` and retries with the next number
//! - the current pointer is replaced via temp file + rename

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::ArtifactStore;
use crate::{Error, Result};

const CURRENT_FILE: &str = "current_model.txt";
const MODEL_FILE: &str = "model.bin";
const METRICS_FILE: &str = "metrics.json";

/// Durable artifact store rooted at a directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns error if the directory tree cannot be created.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("experiments"))?;
        fs::create_dir_all(root.join("promoted"))?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn experiments_dir(&self) -> PathBuf {
        self.root.join("experiments")
    }

    fn promoted_dir(&self) -> PathBuf {
        self.root.join("promoted")
    }

    fn model_path(&self, version: u32) -> PathBuf {
        self.promoted_dir().join(format!("v{version}.bin"))
    }

    fn metrics_path(&self, version: u32) -> PathBuf {
        self.promoted_dir().join(format!("v{version}_metrics.json"))
    }

    /// Parse a version number out of a `v<N>.bin` file name.
    fn parse_version(name: &str) -> Option<u32> {
        name.strip_prefix('v')?.strip_suffix(".bin")?.parse().ok()
    }

    fn max_version(&self) -> Result<u32> {
        Ok(self.versions()?.last().copied().unwrap_or(0))
    }

    fn write_atomic(&self, dest: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = dest.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, dest)?;
        Ok(())
    }

    fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl ArtifactStore for FsStore {
    fn put_experiment(&self, id: &str, model: &[u8], metrics_json: &[u8]) -> Result<()> {
        let final_dir = self.experiments_dir().join(id);
        if final_dir.exists() {
            return Err(Error::Storage(format!(
                "experiment '{id}' already exists (records are immutable)"
            )));
        }

        // Stage both files, then publish the pair with one rename.
        let staging = self.experiments_dir().join(format!(".tmp-{id}"));
        fs::create_dir_all(&staging)?;
        let result = (|| -> Result<()> {
            fs::write(staging.join(MODEL_FILE), model)?;
            fs::write(staging.join(METRICS_FILE), metrics_json)?;
            fs::rename(&staging, &final_dir)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_dir_all(&staging);
        }
        result
    }

    fn experiment(&self, id: &str) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let dir = self.experiments_dir().join(id);
        let Some(model) = Self::read_optional(&dir.join(MODEL_FILE))? else {
            return Ok(None);
        };
        let metrics = Self::read_optional(&dir.join(METRICS_FILE))?.ok_or_else(|| {
            Error::Storage(format!("experiment '{id}' is missing its metrics file"))
        })?;
        Ok(Some((model, metrics)))
    }

    fn experiment_exists(&self, id: &str) -> Result<bool> {
        Ok(self.experiments_dir().join(id).exists())
    }

    fn publish_version(&self, model: &[u8], metrics_json: &[u8]) -> Result<u32> {
        let mut version = self.max_version()? + 1;

        // Reserve the number: create_new fails for a racer that lost, which
        // simply retries with the next slot.
        let mut file = loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.model_path(version))
            {
                Ok(file) => break file,
                Err(err) if err.kind() == ErrorKind::AlreadyExists => version += 1,
                Err(err) => return Err(err.into()),
            }
        };

        file.write_all(model)?;
        file.sync_all()?;
        self.write_atomic(&self.metrics_path(version), metrics_json)?;

        Ok(version)
    }

    fn version_model(&self, version: u32) -> Result<Option<Vec<u8>>> {
        Self::read_optional(&self.model_path(version))
    }

    fn version_metrics(&self, version: u32) -> Result<Option<Vec<u8>>> {
        Self::read_optional(&self.metrics_path(version))
    }

    fn versions(&self) -> Result<Vec<u32>> {
        let mut versions = Vec::new();
        for entry in fs::read_dir(self.promoted_dir())? {
            let entry = entry?;
            if let Some(v) = entry.file_name().to_str().and_then(Self::parse_version) {
                versions.push(v);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    fn current_version(&self) -> Result<Option<u32>> {
        let path = self.root.join(CURRENT_FILE);
        let Some(bytes) = Self::read_optional(&path)? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes);
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let version = text
            .strip_prefix('v')
            .unwrap_or(text)
            .parse()
            .map_err(|_| Error::Storage(format!("malformed current pointer: '{text}'")))?;
        Ok(Some(version))
    }

    fn set_current(&self, version: u32) -> Result<()> {
        if !self.model_path(version).exists() {
            return Err(Error::Storage(format!(
                "cannot point current at missing version v{version}"
            )));
        }
        self.write_atomic(&self.root.join(CURRENT_FILE), format!("v{version}").as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experiment_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        store
            .put_experiment("run_20240101_120000", b"model-bytes", b"{\"rmse\": 2.5}")
            .unwrap();

        let (model, metrics) = store.experiment("run_20240101_120000").unwrap().unwrap();
        assert_eq!(model, b"model-bytes");
        assert_eq!(metrics, b"{\"rmse\": 2.5}");
        assert!(store.experiment("run_other").unwrap().is_none());
    }

    #[test]
    fn test_experiment_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        store.put_experiment("run_1", b"a", b"{}").unwrap();
        assert!(store.put_experiment("run_1", b"b", b"{}").is_err());
    }

    #[test]
    fn test_version_numbering_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FsStore::open(dir.path()).unwrap();
            assert_eq!(store.publish_version(b"m1", b"{}").unwrap(), 1);
            assert_eq!(store.publish_version(b"m2", b"{}").unwrap(), 2);
        }

        // Fresh handle on the same directory continues the numbering.
        let store = FsStore::open(dir.path()).unwrap();
        assert_eq!(store.publish_version(b"m3", b"{}").unwrap(), 3);
        assert_eq!(store.versions().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_current_pointer_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        assert!(store.current_version().unwrap().is_none());
        assert!(store.set_current(1).is_err());

        let v = store.publish_version(b"m", b"{\"rmse\": 1.0}").unwrap();
        store.set_current(v).unwrap();
        assert_eq!(store.current_version().unwrap(), Some(v));
    }

    #[test]
    fn test_empty_pointer_file_reads_as_unset() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        fs::write(dir.path().join(CURRENT_FILE), "").unwrap();
        assert!(store.current_version().unwrap().is_none());
    }

    #[test]
    fn test_metrics_bytes_round_trip_identically() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        let metrics = b"{\n    \"rmse\": 450.0\n}";
        let v = store.publish_version(b"m", metrics).unwrap();
        assert_eq!(store.version_metrics(v).unwrap().unwrap(), metrics);
    }

    #[test]
    fn test_parse_version_ignores_foreign_files() {
        assert_eq!(FsStore::parse_version("v12.bin"), Some(12));
        assert_eq!(FsStore::parse_version("v12_metrics.json"), None);
        assert_eq!(FsStore::parse_version("vx.bin"), None);
        assert_eq!(FsStore::parse_version("model.bin"), None);
    }
}
