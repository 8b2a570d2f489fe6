//! Local files handed to the browser for upload

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::{E2eError, E2eResult};

/// A file with a chosen name inside its own temporary directory; removed on drop
#[derive(Debug)]
pub struct TempUpload {
    _dir: TempDir,
    path: PathBuf,
}

impl TempUpload {
    pub fn new(file_name: &str, contents: &[u8]) -> E2eResult<Self> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(E2eError::StepFailed {
                step: "prepare upload".to_string(),
                reason: format!("invalid file name {:?}", file_name),
            });
        }
        let dir = tempfile::Builder::new().prefix("pagewalk-upload-").tempdir()?;
        let path = dir.path().join(file_name);
        std::fs::write(&path, contents)?;
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_lives_as_long_as_handle() {
        let upload = TempUpload::new("notes.txt", b"hello").unwrap();
        let path = upload.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        drop(upload);
        assert!(!path.exists());
    }

    #[test]
    fn test_rejects_nested_names() {
        assert!(TempUpload::new("a/b.txt", b"").is_err());
        assert!(TempUpload::new("", b"").is_err());
    }
}
