//! Artifact persistence
//!
//! Fitted objects are stored as bincode blobs. Files are overwritten on
//! every save; there is no versioning or checksum.

use crate::error::{Result, SeverityError};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;
use tracing::{debug, info};

/// Reads and writes serialized artifacts
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactStore;

impl ArtifactStore {
    pub fn new() -> Self {
        Self
    }

    /// Serialize `object` to `path`, creating parent directories.
    ///
    /// The writer is flushed explicitly so write errors surface here rather
    /// than being swallowed on drop.
    pub fn save<T: Serialize>(&self, object: &T, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let written = bincode::serialize_into(&mut writer, object)
            .map_err(SeverityError::from)
            .and_then(|_| writer.flush().map_err(SeverityError::from));

        match written {
            Ok(()) => {
                info!(path = %path.display(), "Saved artifact");
                Ok(())
            }
            Err(e) => {
                drop(writer);
                let _ = fs::remove_file(path);
                Err(e)
            }
        }
    }

    /// Deserialize an object previously written by [`ArtifactStore::save`]
    pub fn load<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SeverityError::ArtifactNotFound(path.to_path_buf()),
            _ => SeverityError::IoError(e),
        })?;

        let object = bincode::deserialize_from(BufReader::new(file)).map_err(|e| {
            SeverityError::CorruptArtifact {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        debug!(path = %path.display(), "Loaded artifact");
        Ok(object)
    }

    /// Delete an artifact; absent files are not an error
    pub fn remove(&self, path: impl AsRef<Path>) -> Result<()> {
        match fs::remove_file(path.as_ref()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind as Kind;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Dummy {
        name: String,
        weights: Vec<f64>,
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/dummy.bin");
        let store = ArtifactStore::new();
        let obj = Dummy { name: "tree".into(), weights: vec![0.5, -1.25] };

        store.save(&obj, &path).unwrap();
        let loaded: Dummy = store.load(&path).unwrap();
        assert_eq!(loaded, obj);
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dummy.bin");
        let store = ArtifactStore::new();
        store.save(&Dummy { name: "a".into(), weights: vec![1.0; 100] }, &path).unwrap();
        store.save(&Dummy { name: "b".into(), weights: vec![] }, &path).unwrap();

        let loaded: Dummy = store.load(&path).unwrap();
        assert_eq!(loaded.name, "b");
        assert!(loaded.weights.is_empty());
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactStore::new().load::<Dummy>(dir.path().join("nope.bin")).unwrap_err();
        assert!(matches!(err, SeverityError::ArtifactNotFound(_)));
        assert_eq!(err.kind(), Kind::ArtifactIo);
    }

    #[test]
    fn test_corrupt_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        std::fs::write(&path, [0xffu8, 0x01]).unwrap();
        let err = ArtifactStore::new().load::<Dummy>(&path).unwrap_err();
        assert!(matches!(err, SeverityError::CorruptArtifact { .. }));
    }

    #[test]
    fn test_remove_absent_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ArtifactStore::new().remove(dir.path().join("absent.bin")).is_ok());
    }
}
