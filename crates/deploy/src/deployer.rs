//! The run orchestrator: resolve, then bring each unit up in order.

use std::{collections::HashSet, fmt};

use alloy_core::primitives::Address;

use crate::{
    abi::{Arg, Call},
    error::{DeployError, Result},
    graph::UnitRegistry,
    network::{NetworkProfile, NetworkProvider, UpgradeableMode},
    proxy::ProxyManager,
    store::{DeploymentRecord, RecordStore},
    unit::{ArgsFn, Strategy, Unit, UnitContext},
    wiring::wire,
};

/// What happened to a unit during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// A new contract was deployed and recorded.
    Deployed {
        address: Address,
        implementation: Option<Address>,
    },
    /// An existing proxy now points at a new implementation.
    Upgraded {
        proxy: Address,
        implementation: Address,
    },
    /// A record already existed and was reused as is.
    Reused { address: Address },
    /// Not applicable on this network.
    Skipped,
    /// Wiring transactions were issued.
    Wired { calls: Vec<Call> },
}

impl fmt::Display for UnitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deployed {
                address,
                implementation: Some(implementation),
            } => write!(f, "deployed {address} (implementation {implementation})"),
            Self::Deployed { address, .. } => write!(f, "deployed {address}"),
            Self::Upgraded {
                proxy,
                implementation,
            } => write!(f, "upgraded {proxy} to {implementation}"),
            Self::Reused { address } => write!(f, "reusing {address}"),
            Self::Skipped => f.write_str("skipped"),
            Self::Wired { calls } => write!(f, "{} wiring calls", calls.len()),
        }
    }
}

/// Outcome of every unit a run touched, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub network: String,
    pub units: Vec<(String, UnitOutcome)>,
}

impl RunReport {
    pub fn outcome(&self, unit: &str) -> Option<&UnitOutcome> {
        self.units
            .iter()
            .find(|(name, _)| name == unit)
            .map(|(_, outcome)| outcome)
    }

    pub fn deployed(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Deployed { .. }))
    }

    pub fn upgraded(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Upgraded { .. }))
    }

    pub fn reused(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Reused { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Skipped))
    }

    /// Total wiring transactions issued.
    pub fn wiring_calls(&self) -> usize {
        self.units
            .iter()
            .map(|(_, outcome)| match outcome {
                UnitOutcome::Wired { calls } => calls.len(),
                _ => 0,
            })
            .sum()
    }

    fn count(&self, predicate: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.units.iter().filter(|(_, o)| predicate(o)).count()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, outcome) in &self.units {
            writeln!(f, "{name}: {outcome}")?;
        }
        write!(
            f,
            "{}: {} deployed, {} upgraded, {} reused, {} skipped, {} wiring calls",
            self.network,
            self.deployed(),
            self.upgraded(),
            self.reused(),
            self.skipped(),
            self.wiring_calls()
        )
    }
}

/// Drives a deployment run against one network.
///
/// The deployer is the only writer of records. Each unit's record is written as soon as the
/// unit finishes, so a failed run can be resumed and will reuse everything it already did.
pub struct Deployer<'a, N, S> {
    network: String,
    profile: NetworkProfile,
    provider: &'a N,
    store: &'a S,
    registry: &'a UnitRegistry,
}

impl<'a, N: NetworkProvider, S: RecordStore> Deployer<'a, N, S> {
    /// Fails with [`DeployError::ChainMismatch`] if `provider` serves another chain than
    /// `profile` describes.
    pub fn new(
        network: impl Into<String>,
        profile: NetworkProfile,
        provider: &'a N,
        store: &'a S,
        registry: &'a UnitRegistry,
    ) -> Result<Self> {
        if provider.chain_id() != profile.chain_id {
            return Err(DeployError::ChainMismatch {
                expected: profile.chain_id,
                actual: provider.chain_id(),
            });
        }

        Ok(Self {
            network: network.into(),
            profile,
            provider,
            store,
            registry,
        })
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// The execution order for `tags`, without touching the chain.
    pub fn plan<T: AsRef<str>>(&self, tags: &[T]) -> Result<Vec<&'a Unit>> {
        self.registry.resolve(tags)
    }

    /// Bring up every unit selected by `tags`, dependencies first.
    ///
    /// Stops at the first failing unit. Records written before the failure are kept.
    pub async fn run<T: AsRef<str>>(&self, tags: &[T]) -> Result<RunReport> {
        let order = self.plan(tags)?;
        self.check_known_addresses(&order)?;

        tracing::info!(
            network = %self.network,
            chain_id = self.profile.chain_id,
            units = order.len(),
            "Starting deployment run"
        );

        let mut report = RunReport {
            network: self.network.clone(),
            units: Vec::with_capacity(order.len()),
        };
        for unit in order {
            let outcome = self
                .execute(unit)
                .await
                .map_err(|e| e.in_unit(unit.name, &self.network))?;
            tracing::info!(unit = unit.name, network = %self.network, %outcome, "Unit done");
            report.units.push((unit.name.to_string(), outcome));
        }

        tracing::info!(
            network = %self.network,
            deployed = report.deployed(),
            reused = report.reused(),
            wiring_calls = report.wiring_calls(),
            "Deployment run complete"
        );
        Ok(report)
    }

    fn is_skipped(&self, unit: &Unit) -> bool {
        unit.local_only && !self.profile.local
    }

    /// Every known address a planned unit needs must be resolvable before the first
    /// transaction: from the network table, a record on disk, or a unit deployed earlier in
    /// this run.
    fn check_known_addresses(&self, order: &[&Unit]) -> Result<()> {
        let planned: HashSet<&str> = order
            .iter()
            .filter(|unit| !self.is_skipped(unit))
            .map(|unit| unit.name)
            .collect();

        for unit in order.iter().filter(|unit| !self.is_skipped(unit)) {
            for &name in unit.requires {
                let err = match self.provider.resolve_known_address(name) {
                    Ok(_) => continue,
                    Err(e) => e,
                };
                let stand_in = matches!(err, DeployError::NotConfigured { .. })
                    && (planned.contains(name) || self.store.exists(name, &self.network)?);
                if !stand_in {
                    return Err(err.in_unit(unit.name, &self.network));
                }
            }
        }
        Ok(())
    }

    fn context(&self) -> UnitContext<'_> {
        UnitContext::new(&self.network, self.provider, self.store)
    }

    fn args(&self, args: ArgsFn) -> Result<Vec<Arg>> {
        args(&self.context())
    }

    fn proxies(&self) -> ProxyManager<'_, N> {
        ProxyManager::new(
            self.provider,
            self.profile.timeout(),
            self.profile.proxy_timeout(),
        )
    }

    async fn execute(&self, unit: &Unit) -> Result<UnitOutcome> {
        if self.is_skipped(unit) {
            tracing::info!(unit = unit.name, network = %self.network, "Local-only unit skipped");
            return Ok(UnitOutcome::Skipped);
        }

        match unit.strategy {
            Strategy::Plain { contract, args } => self.deploy(unit, contract, args, false).await,
            Strategy::Upgradeable { contract, args } => {
                let proxied = self.profile.upgradeable_mode == UpgradeableMode::Proxy;
                self.deploy(unit, contract, args, proxied).await
            }
            Strategy::Upgrade { target, contract } => self.upgrade(target, contract).await,
            Strategy::Wiring(calls) => {
                let report = wire(
                    self.provider,
                    self.store,
                    &self.network,
                    calls,
                    self.profile.timeout(),
                )
                .await?;
                Ok(UnitOutcome::Wired {
                    calls: report.calls,
                })
            }
        }
    }

    async fn deploy(
        &self,
        unit: &Unit,
        contract: &str,
        args: ArgsFn,
        proxied: bool,
    ) -> Result<UnitOutcome> {
        if let Some(record) = self.store.get(unit.name, &self.network)? {
            tracing::info!(
                unit = unit.name,
                network = %self.network,
                address = %record.address,
                "Reusing existing deployment"
            );
            return Ok(UnitOutcome::Reused {
                address: record.address,
            });
        }

        let args = self.args(args)?;
        let artifact = self.provider.artifact(contract)?;
        tracing::debug!(unit = unit.name, contract, proxied, args = args.len(), "Deploying");

        let (record, outcome) = if proxied {
            let deployment = self.proxies().deploy_proxy(contract, &args).await?;
            (
                DeploymentRecord::proxy(deployment.proxy, deployment.implementation, artifact),
                UnitOutcome::Deployed {
                    address: deployment.proxy,
                    implementation: Some(deployment.implementation),
                },
            )
        } else {
            let address = self.proxies().deploy_plain(contract, &args).await?;
            (
                DeploymentRecord::plain(address, artifact),
                UnitOutcome::Deployed {
                    address,
                    implementation: None,
                },
            )
        };

        self.store.put(unit.name, &self.network, &record)?;
        Ok(outcome)
    }

    async fn upgrade(&self, target: &str, contract: &str) -> Result<UnitOutcome> {
        let record = self
            .store
            .get(target, &self.network)?
            .ok_or_else(|| DeployError::MissingRecord {
                name: target.to_string(),
                network: self.network.clone(),
            })?;
        let Some(recorded) = record.implementation_address else {
            return Err(DeployError::NotAProxy {
                name: target.to_string(),
                network: self.network.clone(),
            });
        };

        if record.artifact.contract_name == contract {
            tracing::info!(
                target,
                contract,
                network = %self.network,
                "Proxy already runs this implementation"
            );
            return Ok(UnitOutcome::Reused {
                address: record.address,
            });
        }

        let artifact = self.provider.artifact(contract)?;
        let proxies = self.proxies();
        let current = record.artifact.contract_name.as_str();

        // A previous run may have swapped the implementation without recording it.
        if let Some(implementation) = proxies
            .landed_upgrade(current, record.address, recorded)
            .await?
        {
            let repaired = DeploymentRecord::proxy(record.address, implementation, artifact);
            self.store.put(target, &self.network, &repaired)?;
            return Ok(UnitOutcome::Upgraded {
                proxy: record.address,
                implementation,
            });
        }

        let deployment = proxies
            .upgrade_proxy(current, record.address, contract)
            .await?;

        let updated = DeploymentRecord::proxy(deployment.proxy, deployment.implementation, artifact);
        self.store.put(target, &self.network, &updated)?;

        Ok(UnitOutcome::Upgraded {
            proxy: deployment.proxy,
            implementation: deployment.implementation,
        })
    }
}
