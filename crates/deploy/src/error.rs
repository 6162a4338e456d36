//! Error taxonomy for deployment runs.

use std::{path::PathBuf, time::Duration};

use alloy_core::primitives::{Address, B256, U256};

/// Errors surfaced by the deployment core.
///
/// Every failure aborts the current run. [`DeployError::Unit`] wraps failures raised while a
/// specific unit was executing so the operator knows where to resume.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("unit `{unit}` depends on unknown unit `{dependency}`")]
    UnknownDependency { unit: String, dependency: String },

    #[error("unit `{0}` is declared more than once")]
    DuplicateUnit(String),

    #[error("no unit is tagged `{0}`")]
    UnknownTag(String),

    #[error("`{name}` is not configured for chain {chain_id}")]
    NotConfigured { name: String, chain_id: u64 },

    #[error("network profile expects chain {expected} but the provider reports chain {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("proxy {proxy} is already initialized")]
    AlreadyInitialized { proxy: Address },

    #[error("upgrade rejected: version {candidate} does not advance past {current}")]
    UpgradeVersion { current: U256, candidate: U256 },

    #[error("proxy {proxy} points at {actual} instead of {expected} after upgrade")]
    ImplementationMismatch {
        proxy: Address,
        expected: Address,
        actual: Address,
    },

    #[error("`{name}` on `{network}` is not proxy-backed")]
    NotAProxy { name: String, network: String },

    #[error("transaction reverted: {reason}")]
    TransactionReverted { reason: String },

    #[error("transaction {tx_hash} not confirmed within {timeout:?}")]
    TransactionTimeout { tx_hash: B256, timeout: Duration },

    #[error("no deployment record for `{name}` on `{network}`")]
    MissingRecord { name: String, network: String },

    #[error("artifact `{contract}`: {message}")]
    Artifact { contract: String, message: String },

    #[error("abi: {0}")]
    Abi(String),

    #[error("rpc `{method}` failed: {message}")]
    Rpc { method: String, message: String },

    #[error("record store I/O at {}: {source}", path.display())]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt deployment record at {}: {source}", path.display())]
    StoreCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("deployments for `{0}` are locked by another run")]
    Locked(String),

    #[error("unit `{unit}` failed on `{network}`: {source}")]
    Unit {
        unit: String,
        network: String,
        #[source]
        source: Box<DeployError>,
    },
}

impl DeployError {
    /// Attach the failing unit and network to an error.
    pub fn in_unit(self, unit: &str, network: &str) -> Self {
        Self::Unit {
            unit: unit.to_string(),
            network: network.to_string(),
            source: Box::new(self),
        }
    }

    /// The underlying error, with any unit context stripped.
    pub fn root(&self) -> &DeployError {
        match self {
            Self::Unit { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn artifact(contract: &str, message: impl std::fmt::Display) -> Self {
        Self::Artifact {
            contract: contract.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = DeployError> = std::result::Result<T, E>;
