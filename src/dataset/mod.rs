//! Dataset directories and their artifact layout.

mod paths;

pub use paths::{fss_file_for, normalize_path, DatasetPaths, FSS_EXTENSION};

use std::path::Path;

/// A capture session on disk.
#[derive(Debug, Clone)]
pub struct Dataset {
    paths: DatasetPaths,
}

impl Dataset {
    /// Open an existing dataset directory.
    ///
    /// Fails when the root does not exist or is not a readable directory.
    pub fn open(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let paths = DatasetPaths::new(root);
        let meta = std::fs::metadata(paths.root())?;
        if !meta.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a directory", paths.root().display()),
            ));
        }
        std::fs::read_dir(paths.root())?;
        Ok(Self { paths })
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    pub fn paths(&self) -> &DatasetPaths {
        &self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_existing_dataset() {
        let dir = TempDir::new().unwrap();
        let dataset = Dataset::open(dir.path()).unwrap();
        assert!(dataset.root().is_absolute());
        assert_eq!(
            dataset.paths().octree(),
            dataset.root().join("models/carving/carving.oct")
        );
    }

    #[test]
    fn test_open_missing_dataset() {
        let dir = TempDir::new().unwrap();
        assert!(Dataset::open(dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_open_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        let err = Dataset::open(&file).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}
