use std::path::{Path, PathBuf};

use super::{DeploymentRecord, RecordStore};
use crate::{
    error::{DeployError, Result},
    fs::{FileLock, FsHandler},
};

/// Name of the per-network lock file.
const LOCK_FILENAME: &str = ".lock";

/// Records laid out as `<root>/<network>/<Name>.json`.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn network_dir(&self, network: &str) -> PathBuf {
        self.root.join(network)
    }

    fn record_path(&self, name: &str, network: &str) -> PathBuf {
        self.network_dir(network).join(format!("{name}.json"))
    }

    /// Lock `network` for the duration of a run.
    ///
    /// Every transaction of a run comes from the same signer, so two concurrent runs against
    /// one network would race on its nonce.
    pub fn lock(&self, network: &str) -> Result<FileLock> {
        FsHandler::lock_exclusive(&self.network_dir(network).join(LOCK_FILENAME), network)
    }

    fn read_record(path: &Path) -> Result<DeploymentRecord> {
        let content = std::fs::read_to_string(path).map_err(|e| DeployError::store_io(path, e))?;
        serde_json::from_str(&content).map_err(|source| DeployError::StoreCorrupt {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl RecordStore for FileRecordStore {
    fn get(&self, name: &str, network: &str) -> Result<Option<DeploymentRecord>> {
        let path = self.record_path(name, network);
        let exists = path
            .try_exists()
            .map_err(|e| DeployError::store_io(&path, e))?;
        if !exists {
            return Ok(None);
        }
        Self::read_record(&path).map(Some)
    }

    fn put(&self, name: &str, network: &str, record: &DeploymentRecord) -> Result<()> {
        let path = self.record_path(name, network);
        let previous = self.get(name, network)?;
        let record = record.clone().replacing(previous.as_ref());

        let json = serde_json::to_string_pretty(&record).map_err(|source| {
            DeployError::StoreCorrupt {
                path: path.clone(),
                source,
            }
        })?;
        FsHandler::write_atomic(&path, json.as_bytes())?;

        tracing::debug!(name, network, path = %path.display(), "Deployment record saved");
        Ok(())
    }

    fn list(&self, network: &str) -> Result<Vec<(String, DeploymentRecord)>> {
        let dir = self.network_dir(network);
        if !dir.try_exists().map_err(|e| DeployError::store_io(&dir, e))? {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| DeployError::store_io(&dir, e))? {
            let path = entry.map_err(|e| DeployError::store_io(&dir, e))?.path();
            let is_record = path.extension().is_some_and(|ext| ext == "json")
                && !path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with('.'));
            if !is_record {
                continue;
            }
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            records.push((name, Self::read_record(&path)?));
        }

        records.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(records)
    }
}
