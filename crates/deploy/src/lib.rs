//! pledge-deploy - Deployment orchestration for the liquid staking contracts.
//!
//! This crate resolves tagged deployment units into a dependency order, deploys plain and
//! proxy-backed contracts through a [`NetworkProvider`], persists where everything landed in a
//! [`RecordStore`], and wires the deployed contracts together once they are all up.

pub mod abi;
mod deployer;
mod error;
mod fs;
mod graph;
pub mod network;
pub mod proxy;
mod rpc;
pub mod store;
mod unit;
pub mod units;
mod wiring;

pub use abi::{Arg, ArtifactMetadata, Call, TxReceipt};
pub use deployer::{Deployer, RunReport, UnitOutcome};
pub use error::{DeployError, Result};
pub use fs::FileLock;
pub use graph::{UnitRegistry, resolve};
pub use network::{
    ChainIdentity, NetworkProfile, NetworkProvider, RpcNetwork, UpgradeableMode, builtin_networks,
};
pub use proxy::{ProxyDeployment, ProxyManager};
pub use store::{DeploymentRecord, FileRecordStore, MemoryRecordStore, RecordStore};
pub use unit::{ArgsFn, Strategy, Unit, UnitContext, WiringCall};
pub use wiring::{WiringReport, wire};
