use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use super::{DeploymentRecord, RecordStore};
use crate::error::Result;

type Key = (String, String);

/// In-process record store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<Key, DeploymentRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<Key, DeploymentRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of records across all networks.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, name: &str, network: &str) -> Result<Option<DeploymentRecord>> {
        Ok(self
            .records()
            .get(&(network.to_string(), name.to_string()))
            .cloned())
    }

    fn put(&self, name: &str, network: &str, record: &DeploymentRecord) -> Result<()> {
        let mut records = self.records();
        let key = (network.to_string(), name.to_string());
        let record = record.clone().replacing(records.get(&key));
        records.insert(key, record);
        Ok(())
    }

    fn list(&self, network: &str) -> Result<Vec<(String, DeploymentRecord)>> {
        Ok(self
            .records()
            .iter()
            .filter(|((net, _), _)| net == network)
            .map(|((_, name), record)| (name.clone(), record.clone()))
            .collect())
    }
}
