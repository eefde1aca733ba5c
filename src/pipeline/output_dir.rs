//! Create-or-clear handling for stage output directories.

use crate::error::{PipelineError, Step, StepResult};
use std::path::Path;

/// Make `dir` an existing, empty directory.
///
/// Missing directories are created with their parents. An existing directory
/// has all of its entries removed. Anything else at that path, including a
/// symbolic link, is an error.
pub fn prepare_output_dir(step: Step, dir: &Path) -> StepResult<()> {
    let fs_error = |message: String| PipelineError::FilesystemState {
        step,
        path: dir.to_path_buf(),
        message,
    };

    let meta = match std::fs::symlink_metadata(dir) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("Creating output directory {}", dir.display());
            std::fs::create_dir_all(dir)
                .map_err(|e| fs_error(format!("unable to create directory: {e}")))?;
            return Ok(());
        }
        Err(e) => return Err(fs_error(format!("unable to inspect: {e}"))),
        Ok(meta) => meta,
    };

    // never clear through a link
    let file_type = meta.file_type();
    if file_type.is_symlink() {
        return Err(fs_error("is a symbolic link".to_string()));
    }
    if !file_type.is_dir() {
        return Err(fs_error("exists but is not a directory".to_string()));
    }

    let entries =
        std::fs::read_dir(dir).map_err(|e| fs_error(format!("unable to list: {e}")))?;
    let mut removed = 0usize;
    for entry in entries {
        let entry = entry.map_err(|e| fs_error(format!("unable to list: {e}")))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| fs_error(format!("unable to inspect {}: {e}", path.display())))?;
        let result = if file_type.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        result.map_err(|e| fs_error(format!("unable to remove {}: {e}", path.display())))?;
        removed += 1;
    }

    if removed > 0 {
        tracing::info!(
            "Cleared {} stale entries from {}",
            removed,
            dir.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a/b/chunks");
        prepare_output_dir(Step::ChunkGeneration, &dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_clears_existing_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("chunks");
        std::fs::create_dir_all(dir.join("nested/deeper")).unwrap();
        std::fs::write(dir.join("old.chunk"), "stale").unwrap();
        std::fs::write(dir.join("nested/deeper/x.chunk"), "stale").unwrap();

        prepare_output_dir(Step::ChunkGeneration, &dir).unwrap();

        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_rejects_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chunks");
        std::fs::write(&path, "not a dir").unwrap();

        let err = prepare_output_dir(Step::ChunkGeneration, &path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FilesystemState);
        assert_eq!(err.code(), -13);
        // the file is left alone
        assert!(path.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_and_keeps_target() {
        let tmp = TempDir::new().unwrap();
        let outside = tmp.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("precious.txt"), "keep").unwrap();
        let link = tmp.path().join("chunks");
        std::os::unix::fs::symlink(&outside, &link).unwrap();

        let err = prepare_output_dir(Step::ChunkGeneration, &link).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FilesystemState);
        assert_eq!(err.code(), -13);
        assert!(outside.join("precious.txt").is_file());
        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }
}
