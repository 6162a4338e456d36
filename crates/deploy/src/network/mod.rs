//! The network context collaborator.
//!
//! The core never signs, builds or prices transactions itself. It asks a [`NetworkProvider`]
//! to deploy a contract, send a call or read a view, and asks its [`ChainIdentity`] for the
//! chain-specific addresses of pre-existing infrastructure.

mod profile;
mod rpc;

use std::{future::Future, time::Duration};

use alloy_core::primitives::{Address, Bytes};

pub use profile::{
    DEFAULT_PROXY_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS, NetworkProfile, UpgradeableMode, WFIL,
    builtin_networks,
};
pub use rpc::RpcNetwork;

use crate::{
    abi::{Arg, ArtifactMetadata, Call, TxReceipt},
    error::Result,
};

/// Chain identity and the static known-address table.
///
/// Kept separate from [`NetworkProvider`] so unit argument builders can borrow it as a trait
/// object.
pub trait ChainIdentity: Send + Sync {
    /// The chain this provider submits to.
    fn chain_id(&self) -> u64;

    /// The account that signs every transaction of the run.
    fn signer(&self) -> Address;

    /// Look up a well-known external contract, failing with
    /// [`DeployError::NotConfigured`](crate::DeployError::NotConfigured) when the chain has no
    /// entry for it.
    fn resolve_known_address(&self, name: &str) -> Result<Address>;
}

/// Transaction-submitting access to a chain.
pub trait NetworkProvider: ChainIdentity {
    /// Interface metadata of a compiled contract.
    fn artifact(&self, contract: &str) -> Result<ArtifactMetadata>;

    /// ABI-encode `call` into calldata without sending it.
    fn encode_call(&self, call: &Call) -> Result<Bytes>;

    /// Deploy `contract` with constructor `args`, waiting up to `timeout` for confirmation.
    fn deploy_contract(
        &self,
        contract: &str,
        args: &[Arg],
        timeout: Duration,
    ) -> impl Future<Output = Result<Address>> + Send;

    /// Submit a state-changing call and wait up to `timeout` for confirmation.
    fn send_transaction(
        &self,
        to: Address,
        call: &Call,
        timeout: Duration,
    ) -> impl Future<Output = Result<TxReceipt>> + Send;

    /// Execute a read-only call and return its first output value.
    fn view(&self, to: Address, call: &Call) -> impl Future<Output = Result<Arg>> + Send;
}
