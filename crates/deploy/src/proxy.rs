//! Upgradeable proxy lifecycle: first deploy, one-time initialization, implementation upgrades.

use std::time::Duration;

use alloy_core::primitives::{Address, U256};

use crate::{
    abi::{Arg, Call},
    error::{DeployError, Result},
    network::NetworkProvider,
};

/// Artifact of the proxy contract placed in front of every upgradeable implementation.
pub const PROXY_CONTRACT: &str = "ERC1967Proxy";

/// Initializer invoked through a freshly deployed proxy.
pub const INITIALIZER: &str = "initialize";

/// Revert reason emitted when an initializer runs a second time.
const ALREADY_INITIALIZED: &str = "already initialized";

/// Addresses produced by a proxy deployment or upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyDeployment {
    /// Stable public address.
    pub proxy: Address,
    /// Implementation the proxy delegates to.
    pub implementation: Address,
}

/// Deploys contracts and manages proxies through a [`NetworkProvider`].
///
/// Returns addresses only. Persisting them is the caller's job.
pub struct ProxyManager<'a, N> {
    provider: &'a N,
    timeout: Duration,
    proxy_timeout: Duration,
}

impl<'a, N: NetworkProvider> ProxyManager<'a, N> {
    pub fn new(provider: &'a N, timeout: Duration, proxy_timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            proxy_timeout,
        }
    }

    /// Constructor deployment with no proxy and no initializer.
    pub async fn deploy_plain(&self, contract: &str, args: &[Arg]) -> Result<Address> {
        let address = self
            .provider
            .deploy_contract(contract, args, self.timeout)
            .await?;
        tracing::info!(contract, %address, "Contract deployed");
        Ok(address)
    }

    /// Deploy `contract` behind a new proxy initialized with `init_args`.
    ///
    /// The encoded initializer is the proxy's constructor data, so the proxy is never live
    /// uninitialized.
    pub async fn deploy_proxy(&self, contract: &str, init_args: &[Arg]) -> Result<ProxyDeployment> {
        let init_data = self.provider.encode_call(&initializer(contract, init_args))?;

        let implementation = self
            .provider
            .deploy_contract(contract, &[], self.proxy_timeout)
            .await?;
        tracing::debug!(contract, %implementation, "Implementation deployed");

        let proxy = self
            .provider
            .deploy_contract(
                PROXY_CONTRACT,
                &[Arg::Address(implementation), Arg::Bytes(init_data)],
                self.proxy_timeout,
            )
            .await?;

        tracing::info!(contract, %proxy, %implementation, "Proxy deployed and initialized");
        Ok(ProxyDeployment {
            proxy,
            implementation,
        })
    }

    /// Run the initializer of `contract` through `proxy` as its own transaction.
    ///
    /// Proxies from [`Self::deploy_proxy`] are initialized already and fail with
    /// [`DeployError::AlreadyInitialized`].
    pub async fn initialize(&self, contract: &str, proxy: Address, args: &[Arg]) -> Result<()> {
        match self
            .provider
            .send_transaction(proxy, &initializer(contract, args), self.proxy_timeout)
            .await
        {
            Ok(receipt) => {
                tracing::debug!(%proxy, tx_hash = %receipt.transaction_hash, "Proxy initialized");
                Ok(())
            }
            Err(DeployError::TransactionReverted { reason }) if reason.contains(ALREADY_INITIALIZED) => {
                Err(DeployError::AlreadyInitialized { proxy })
            }
            Err(e) => Err(e),
        }
    }

    /// Point `proxy`, currently running `contract`, at a fresh `new_contract` implementation.
    ///
    /// The new implementation's `version()` must be strictly greater than the one the proxy
    /// reports, otherwise nothing is swapped. The proxy address is returned unchanged.
    pub async fn upgrade_proxy(
        &self,
        contract: &str,
        proxy: Address,
        new_contract: &str,
    ) -> Result<ProxyDeployment> {
        let current = self.version(contract, proxy).await?;

        let implementation = self
            .provider
            .deploy_contract(new_contract, &[], self.proxy_timeout)
            .await?;
        let candidate = self.version(new_contract, implementation).await?;
        if candidate <= current {
            return Err(DeployError::UpgradeVersion { current, candidate });
        }

        let call = Call::new(new_contract, "upgradeTo").arg(implementation);
        self.provider
            .send_transaction(proxy, &call, self.proxy_timeout)
            .await?;

        let actual = self.implementation(new_contract, proxy).await?;
        if actual != implementation {
            return Err(DeployError::ImplementationMismatch {
                proxy,
                expected: implementation,
                actual,
            });
        }

        tracing::info!(
            contract = new_contract,
            %proxy,
            %implementation,
            from_version = %current,
            to_version = %candidate,
            "Proxy upgraded"
        );
        Ok(ProxyDeployment {
            proxy,
            implementation,
        })
    }

    /// The implementation `proxy` currently delegates to.
    pub async fn implementation(&self, contract: &str, proxy: Address) -> Result<Address> {
        self.provider
            .view(proxy, &Call::new(contract, "getImplementation"))
            .await?
            .as_address()
    }

    /// Find an upgrade of `proxy` that landed on chain while its record still names the
    /// `recorded` implementation, e.g. after the confirmation wait of `upgradeTo` timed out.
    ///
    /// Returns the implementation the proxy runs when it reports a higher version than
    /// `recorded`. A proxy moved anywhere else fails with [`DeployError::ImplementationMismatch`].
    pub async fn landed_upgrade(
        &self,
        contract: &str,
        proxy: Address,
        recorded: Address,
    ) -> Result<Option<Address>> {
        let actual = self.implementation(contract, proxy).await?;
        if actual == recorded {
            return Ok(None);
        }

        let previous = self.version(contract, recorded).await?;
        let current = self.version(contract, proxy).await?;
        if current <= previous {
            return Err(DeployError::ImplementationMismatch {
                proxy,
                expected: recorded,
                actual,
            });
        }

        tracing::warn!(
            contract,
            %proxy,
            %recorded,
            %actual,
            from_version = %previous,
            to_version = %current,
            "Proxy was upgraded without a matching record"
        );
        Ok(Some(actual))
    }

    async fn version(&self, contract: &str, at: Address) -> Result<U256> {
        self.provider
            .view(at, &Call::new(contract, "version"))
            .await?
            .as_uint()
    }
}

fn initializer(contract: &str, args: &[Arg]) -> Call {
    Call {
        contract: contract.to_string(),
        function: INITIALIZER.to_string(),
        args: args.to_vec(),
    }
}
