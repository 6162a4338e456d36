//! Layered configuration: built-in defaults, then `Pledge.toml`, then `PLEDGE_` variables.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use pledge_deploy::{NetworkProfile, builtin_networks};
use serde::{Deserialize, Serialize};

/// The default name for the pledge configuration file.
pub const DEFAULT_CONFIG_FILENAME: &str = "Pledge.toml";

/// Prefix of environment overrides, e.g. `PLEDGE_NETWORKS__CALIBRATION__RPC_URL`.
const ENV_PREFIX: &str = "PLEDGE_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PledgeConfig {
    /// Root of the deployment record store.
    pub deployments_dir: PathBuf,
    /// Directory holding the compiled contract artifacts.
    pub artifacts_dir: PathBuf,
    /// Network profiles by name.
    pub networks: BTreeMap<String, NetworkProfile>,
}

impl Default for PledgeConfig {
    fn default() -> Self {
        Self {
            deployments_dir: PathBuf::from("deployments"),
            artifacts_dir: PathBuf::from("artifacts"),
            networks: builtin_networks(),
        }
    }
}

impl PledgeConfig {
    /// Merge the defaults with `path` (if it exists) and the environment.
    pub fn load(path: &Path) -> Result<Self> {
        Self::figment(path)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context(format!("Failed to load configuration from {}", path.display()))
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Toml::file(path))
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    pub fn network(&self, name: &str) -> Result<&NetworkProfile> {
        self.networks.get(name).with_context(|| {
            let known: Vec<&str> = self.networks.keys().map(String::as_str).collect();
            format!("Unknown network `{name}`, expected one of: {}", known.join(", "))
        })
    }
}
