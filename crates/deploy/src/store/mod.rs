//! Persisted deployment records.
//!
//! A record is keyed by `(name, network)` and holds the address callers should use (the proxy
//! address for proxy-backed contracts), the implementation behind a proxy, and the interface
//! metadata needed to re-attach to the contract in a later run.

mod file;
mod memory;

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;

use crate::{abi::ArtifactMetadata, error::Result};

/// Where a contract lives on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Public address. For proxy-backed contracts this is the proxy.
    pub address: Address,
    /// Current implementation behind the proxy, absent for plain deployments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_address: Option<Address>,
    pub artifact: ArtifactMetadata,
    /// Unix timestamp of the first write for this key.
    pub created_at: i64,
    /// Unix timestamp of the latest write for this key.
    pub updated_at: i64,
    /// Version of the tool that wrote the record.
    pub tool_version: String,
}

impl DeploymentRecord {
    /// Record for a plain constructor deployment.
    pub fn plain(address: Address, artifact: ArtifactMetadata) -> Self {
        Self::new(address, None, artifact)
    }

    /// Record for a proxy-backed deployment.
    pub fn proxy(proxy: Address, implementation: Address, artifact: ArtifactMetadata) -> Self {
        Self::new(proxy, Some(implementation), artifact)
    }

    fn new(
        address: Address,
        implementation_address: Option<Address>,
        artifact: ArtifactMetadata,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            address,
            implementation_address,
            artifact,
            created_at: now,
            updated_at: now,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn is_proxy(&self) -> bool {
        self.implementation_address.is_some()
    }

    /// Carry the creation time of `previous` over to a record that replaces it.
    pub(crate) fn replacing(mut self, previous: Option<&DeploymentRecord>) -> Self {
        if let Some(previous) = previous {
            self.created_at = previous.created_at;
        }
        self
    }
}

/// Storage for deployment records.
///
/// At most one record exists per `(name, network)`. Implementations must make a successful
/// [`put`](RecordStore::put) visible to every later [`get`](RecordStore::get), and must never
/// leave a partially written record behind.
pub trait RecordStore: Send + Sync {
    fn get(&self, name: &str, network: &str) -> Result<Option<DeploymentRecord>>;

    /// Insert or overwrite the record for `(name, network)`.
    fn put(&self, name: &str, network: &str, record: &DeploymentRecord) -> Result<()>;

    fn exists(&self, name: &str, network: &str) -> Result<bool> {
        Ok(self.get(name, network)?.is_some())
    }

    /// All records on `network`, sorted by name.
    fn list(&self, network: &str) -> Result<Vec<(String, DeploymentRecord)>>;
}

#[cfg(test)]
pub(crate) fn test_artifact(name: &str) -> ArtifactMetadata {
    ArtifactMetadata {
        contract_name: name.to_string(),
        abi: serde_json::json!([]),
    }
}
