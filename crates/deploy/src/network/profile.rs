//! Per-network configuration and the built-in network table.

use std::{collections::BTreeMap, time::Duration};

use alloy_core::primitives::{Address, address};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DeployError, Result};

/// Default confirmation timeout for plain transactions, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default confirmation timeout for proxy deployments, in seconds.
///
/// Proxy deployments chain several transactions and Filecoin blocks are slow to include them.
pub const DEFAULT_PROXY_TIMEOUT_SECS: u64 = 1000;

/// Logical name of the wrapped FIL token in the known-address table.
pub const WFIL: &str = "WFIL";

/// How upgradeable units are deployed on a network.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum UpgradeableMode {
    /// Implementation behind an ERC-1967 proxy, initialized once.
    #[default]
    Proxy,
    /// Constructor deployment without a proxy. Only meant for local test chains.
    Plain,
}

/// Everything the core needs to know about one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// EIP-155 chain ID.
    pub chain_id: u64,
    /// JSON-RPC endpoint. Usually supplied through the environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<Url>,
    /// Deployer account. The node behind `rpc_url` signs for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Development chain on which stand-in contracts are deployed.
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub upgradeable_mode: UpgradeableMode,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_proxy_timeout_secs")]
    pub proxy_timeout_secs: u64,
    /// Pre-existing contracts that must never be redeployed on this network.
    #[serde(default)]
    pub known_addresses: BTreeMap<String, Address>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_proxy_timeout_secs() -> u64 {
    DEFAULT_PROXY_TIMEOUT_SECS
}

impl NetworkProfile {
    /// A profile with default timeouts and no known addresses.
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            rpc_url: None,
            from: None,
            local: false,
            upgradeable_mode: UpgradeableMode::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            proxy_timeout_secs: DEFAULT_PROXY_TIMEOUT_SECS,
            known_addresses: BTreeMap::new(),
        }
    }

    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    pub fn with_rpc_url(mut self, url: Url) -> Self {
        self.rpc_url = Some(url);
        self
    }

    pub fn with_known_address(mut self, name: impl Into<String>, address: Address) -> Self {
        self.known_addresses.insert(name.into(), address);
        self
    }

    pub fn with_upgradeable_mode(mut self, mode: UpgradeableMode) -> Self {
        self.upgradeable_mode = mode;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }

    /// Resolve a well-known external contract on this network.
    pub fn known_address(&self, name: &str) -> Result<Address> {
        self.known_addresses
            .get(name)
            .copied()
            .ok_or_else(|| DeployError::NotConfigured {
                name: name.to_string(),
                chain_id: self.chain_id,
            })
    }
}

/// The networks the tool knows about out of the box, keyed by network name.
///
/// Live Filecoin networks carry the canonical wrapped FIL address. Development chains have
/// no entry and deploy their own stand-in token.
pub fn builtin_networks() -> BTreeMap<String, NetworkProfile> {
    let mut networks = BTreeMap::new();

    networks.insert("hardhat".to_string(), NetworkProfile::new(31337).local());

    let localnet = NetworkProfile::new(31415926).local();
    let localnet = match Url::parse("http://127.0.0.1:1234/rpc/v1") {
        Ok(url) => localnet.with_rpc_url(url),
        Err(_) => localnet,
    };
    networks.insert("localnet".to_string(), localnet);

    networks.insert(
        "calibration".to_string(),
        NetworkProfile::new(314159)
            .with_known_address(WFIL, address!("0xaC26a4Ab9cF2A8c5DBaB6fb4351ec0F4b07356c4")),
    );
    networks.insert(
        "filecoin".to_string(),
        NetworkProfile::new(314)
            .with_known_address(WFIL, address!("0x60E1773636CF5E4A227d9AC24F20fEca034ee25A")),
    );

    networks
}
