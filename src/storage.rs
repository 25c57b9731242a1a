// src/storage.rs - Filename resolution confined to the uploads root
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("invalid filename: {0}")]
    OutsideRoot(String),
}

/// Resolves job filenames against a designated storage directory. A name
/// that does not land strictly inside the root is rejected, whatever
/// traversal tricks it uses.
#[derive(Debug, Clone)]
pub struct StorageRoot {
    root: PathBuf,
}

impl StorageRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::OutsideRoot(name.to_string()));
        }
        let root = self
            .root
            .canonicalize()
            .map_err(|_| StorageError::NotFound(name.to_string()))?;
        let path = root
            .join(name)
            .canonicalize()
            .map_err(|_| StorageError::NotFound(name.to_string()))?;
        if !path.starts_with(&root) || path == root {
            return Err(StorageError::OutsideRoot(name.to_string()));
        }
        if !path.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolves_file_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("part.gcode");
        fs::write(&file, "G28\n").unwrap();

        let storage = StorageRoot::new(dir.path());
        let resolved = storage.resolve("part.gcode").unwrap();
        assert_eq!(resolved, file.canonicalize().unwrap());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageRoot::new(dir.path());
        assert!(matches!(
            storage.resolve("nope.gcode"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn traversal_outside_root_is_rejected() {
        let outer = tempfile::tempdir().unwrap();
        let uploads = outer.path().join("uploads");
        fs::create_dir(&uploads).unwrap();
        fs::write(outer.path().join("secret.gcode"), "G28\n").unwrap();

        let storage = StorageRoot::new(&uploads);
        assert!(matches!(
            storage.resolve("../secret.gcode"),
            Err(StorageError::OutsideRoot(_))
        ));
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let storage = StorageRoot::new(dir.path());
        assert!(matches!(
            storage.resolve("sub"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn empty_name_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageRoot::new(dir.path());
        assert!(matches!(
            storage.resolve("  "),
            Err(StorageError::OutsideRoot(_))
        ));
    }
}
