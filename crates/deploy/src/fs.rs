//! File system utils.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use fs2::FileExt;

use crate::error::{DeployError, Result};

pub struct FsHandler;

impl FsHandler {
    /// Create a directory and its parents if they don't exist.
    pub fn create_dir(path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| DeployError::store_io(path, e))?;
        tracing::trace!("Ensured directory exists: {}", path.display());
        Ok(())
    }

    /// Write `content` to `path` so that readers see either the old file or the complete
    /// new one.
    ///
    /// The content goes to a hidden sibling file which is synced and then renamed over the
    /// destination.
    pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        Self::create_dir(parent)?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = parent.join(format!(".{file_name}.tmp"));

        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(content)?;
            file.sync_all()?;
            std::fs::rename(&tmp_path, path)
        };

        write().map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            DeployError::store_io(path, e)
        })
    }

    /// Take an exclusive advisory lock on `path`, creating the file if needed.
    ///
    /// Fails with [`DeployError::Locked`] instead of blocking when another process holds it.
    pub fn lock_exclusive(path: &Path, label: &str) -> Result<FileLock> {
        if let Some(parent) = path.parent() {
            Self::create_dir(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| DeployError::store_io(path, e))?;

        file.try_lock_exclusive()
            .map_err(|_| DeployError::Locked(label.to_string()))?;

        tracing::debug!(path = %path.display(), "Acquired deployment lock");

        Ok(FileLock {
            file,
            path: path.to_path_buf(),
        })
    }
}

/// Holds an advisory lock until dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(err = %e, path = %self.path.display(), "Failed to release deployment lock");
        }
    }
}
