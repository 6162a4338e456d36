//! Deployment units: named, idempotent steps with tags and dependencies.

use alloy_core::primitives::Address;

use crate::{
    abi::Arg,
    error::{DeployError, Result},
    network::ChainIdentity,
    store::RecordStore,
};

/// Builds constructor or initializer arguments once a unit's dependencies are deployed.
pub type ArgsFn = fn(&UnitContext<'_>) -> Result<Vec<Arg>>;

/// How a unit brings its contract up.
#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    /// Constructor deployment with no initializer and no upgrade path.
    Plain {
        contract: &'static str,
        args: ArgsFn,
    },
    /// Implementation behind a proxy, initialized once with `args`.
    ///
    /// Networks configured with [`UpgradeableMode::Plain`](crate::UpgradeableMode::Plain)
    /// deploy it like [`Strategy::Plain`], passing `args` to the constructor.
    Upgradeable {
        contract: &'static str,
        args: ArgsFn,
    },
    /// Point the proxy recorded under `target` at a new `contract` implementation.
    Upgrade {
        target: &'static str,
        contract: &'static str,
    },
    /// Register deployed addresses with each other. Always re-issued.
    Wiring(&'static [WiringCall]),
}

/// One "set peer address" transaction: `target.function(address of peer)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WiringCall {
    pub target: &'static str,
    pub function: &'static str,
    pub peer: &'static str,
}

impl WiringCall {
    pub const fn new(target: &'static str, function: &'static str, peer: &'static str) -> Self {
        Self {
            target,
            function,
            peer,
        }
    }
}

/// A named deployment step.
///
/// For deploying strategies the unit name is also the record key.
#[derive(Debug, Clone, Copy)]
pub struct Unit {
    pub name: &'static str,
    pub tags: &'static [&'static str],
    pub dependencies: &'static [&'static str],
    /// Known addresses the unit's arguments read through [`UnitContext::known_address`].
    pub requires: &'static [&'static str],
    /// Only deployed on development networks.
    pub local_only: bool,
    pub strategy: Strategy,
}

impl Unit {
    pub const fn new(name: &'static str, strategy: Strategy) -> Self {
        Self {
            name,
            tags: &[],
            dependencies: &[],
            requires: &[],
            local_only: false,
            strategy,
        }
    }

    pub const fn plain(name: &'static str, contract: &'static str, args: ArgsFn) -> Self {
        Self::new(name, Strategy::Plain { contract, args })
    }

    pub const fn upgradeable(name: &'static str, contract: &'static str, args: ArgsFn) -> Self {
        Self::new(name, Strategy::Upgradeable { contract, args })
    }

    pub const fn upgrade(name: &'static str, target: &'static str, contract: &'static str) -> Self {
        Self::new(name, Strategy::Upgrade { target, contract })
    }

    pub const fn wiring(name: &'static str, calls: &'static [WiringCall]) -> Self {
        Self::new(name, Strategy::Wiring(calls))
    }

    pub const fn tags(mut self, tags: &'static [&'static str]) -> Self {
        self.tags = tags;
        self
    }

    pub const fn depends_on(mut self, dependencies: &'static [&'static str]) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub const fn requires(mut self, known: &'static [&'static str]) -> Self {
        self.requires = known;
        self
    }

    pub const fn local_only(mut self) -> Self {
        self.local_only = true;
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| *t == tag)
    }
}

/// What a unit's argument builder can see.
pub struct UnitContext<'a> {
    network: &'a str,
    identity: &'a dyn ChainIdentity,
    store: &'a dyn RecordStore,
}

impl<'a> UnitContext<'a> {
    pub fn new(
        network: &'a str,
        identity: &'a dyn ChainIdentity,
        store: &'a dyn RecordStore,
    ) -> Self {
        Self {
            network,
            identity,
            store,
        }
    }

    pub fn network(&self) -> &str {
        self.network
    }

    pub fn chain_id(&self) -> u64 {
        self.identity.chain_id()
    }

    /// The account signing the run.
    pub fn signer(&self) -> Address {
        self.identity.signer()
    }

    /// Address of a unit deployed earlier, read back from the record store.
    pub fn address_of(&self, name: &str) -> Result<Address> {
        self.store
            .get(name, self.network)?
            .map(|record| record.address)
            .ok_or_else(|| DeployError::MissingRecord {
                name: name.to_string(),
                network: self.network.to_string(),
            })
    }

    /// Address of a well-known external contract.
    ///
    /// The network's known-address table wins. Without an entry, a stand-in deployed under the
    /// same name on this network is used; otherwise the lookup fails with
    /// [`DeployError::NotConfigured`].
    pub fn known_address(&self, name: &str) -> Result<Address> {
        match self.identity.resolve_known_address(name) {
            Err(DeployError::NotConfigured { name, chain_id }) => {
                match self.store.get(&name, self.network)? {
                    Some(record) => Ok(record.address),
                    None => Err(DeployError::NotConfigured { name, chain_id }),
                }
            }
            resolved => resolved,
        }
    }
}
