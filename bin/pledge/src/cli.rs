use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use pledge_deploy::{
    Deployer, FileRecordStore, NetworkProfile, RecordStore, RpcNetwork, Strategy, Unit,
    UnitRegistry, UpgradeableMode,
};
use tracing::level_filters::LevelFilter;

use crate::config::{DEFAULT_CONFIG_FILENAME, PledgeConfig};

#[derive(Parser)]
#[command(name = "pledge")]
#[command(
    author,
    version,
    about = "Deploy and wire the liquid staking contracts, idempotently"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "PLEDGE_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file.
    ///
    /// Missing files are fine: the built-in networks are used, and `PLEDGE_` environment
    /// variables are layered on top.
    #[arg(short, long, global = true, env = "PLEDGE_CONFIG", default_value = DEFAULT_CONFIG_FILENAME)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Deploy the units selected by tag, and everything they depend on.
    Deploy(DeployArgs),
    /// Print the execution order for a set of tags without touching any network.
    Plan(PlanArgs),
    /// List the deployment records of a network.
    Contracts(ContractsArgs),
    /// List the registered deployment units.
    Units,
    /// Write a configuration file holding the built-in networks.
    Init(InitArgs),
}

impl Command {
    /// Run the command.
    pub async fn run(&self, config_path: &Path) -> Result<()> {
        match self {
            Self::Deploy(cmd) => cmd.run(config_path).await,
            Self::Plan(cmd) => cmd.run(),
            Self::Contracts(cmd) => cmd.run(config_path),
            Self::Units => list_units(),
            Self::Init(cmd) => cmd.run(config_path),
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct DeployArgs {
    /// Name of the target network, as configured.
    #[arg(short, long, env = "PLEDGE_NETWORK")]
    pub network: String,

    /// Tags to deploy, comma separated. Dependencies are pulled in automatically.
    #[arg(short, long, required = true, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Override how upgradeable units are deployed on this network.
    #[arg(long, env = "PLEDGE_UPGRADEABLE_MODE")]
    pub upgradeable_mode: Option<UpgradeableMode>,
}

impl DeployArgs {
    /// Reject anything that would fail before the first transaction: unknown network or tags,
    /// and a network profile without an endpoint or deployer account.
    pub fn validate(&self, config: &PledgeConfig, registry: &UnitRegistry) -> Result<NetworkProfile> {
        validate_tags(&self.tags, registry)?;

        let mut profile = config.network(&self.network)?.clone();
        if let Some(mode) = self.upgradeable_mode {
            profile.upgradeable_mode = mode;
        }
        if profile.upgradeable_mode == UpgradeableMode::Plain && !profile.local {
            anyhow::bail!(
                "Upgradeable mode `plain` is only allowed on local networks, `{}` is not local",
                self.network
            );
        }

        let env_key = self.network.to_uppercase();
        if profile.rpc_url.is_none() {
            anyhow::bail!(
                "No RPC endpoint for `{}`, set networks.{}.rpc_url or PLEDGE_NETWORKS__{env_key}__RPC_URL",
                self.network,
                self.network
            );
        }
        if profile.from.is_none() {
            anyhow::bail!(
                "No deployer account for `{}`, set networks.{}.from or PLEDGE_NETWORKS__{env_key}__FROM",
                self.network,
                self.network
            );
        }

        Ok(profile)
    }

    pub async fn run(&self, config_path: &Path) -> Result<()> {
        let config = PledgeConfig::load(config_path)?;
        let registry = UnitRegistry::builtin().context("Invalid built-in unit table")?;
        let profile = self.validate(&config, &registry)?;

        let store = FileRecordStore::new(&config.deployments_dir);
        let _lock = store.lock(&self.network)?;

        tracing::info!(
            network = %self.network,
            chain_id = profile.chain_id,
            tags = ?self.tags,
            deployments_dir = %config.deployments_dir.display(),
            "Deploying..."
        );

        let provider = RpcNetwork::connect(profile.clone(), &config.artifacts_dir)
            .await
            .context(format!("Failed to connect to `{}`", self.network))?;
        let deployer = Deployer::new(&self.network, profile, &provider, &store, &registry)?;

        let report = deployer.run(&self.tags).await?;
        println!("{report}");
        Ok(())
    }
}

#[derive(Args, Clone, Debug)]
pub struct PlanArgs {
    /// Tags to resolve, comma separated.
    #[arg(short, long, required = true, value_delimiter = ',')]
    pub tags: Vec<String>,
}

impl PlanArgs {
    pub fn run(&self) -> Result<()> {
        let registry = UnitRegistry::builtin().context("Invalid built-in unit table")?;
        validate_tags(&self.tags, &registry)?;

        for (i, unit) in registry.resolve(&self.tags)?.iter().enumerate() {
            println!("{:>2}. {} ({})", i + 1, unit.name, describe(unit));
        }
        Ok(())
    }
}

#[derive(Args, Clone, Debug)]
pub struct ContractsArgs {
    /// Name of the network whose records to list.
    #[arg(short, long, env = "PLEDGE_NETWORK")]
    pub network: String,
}

impl ContractsArgs {
    pub fn run(&self, config_path: &Path) -> Result<()> {
        let config = PledgeConfig::load(config_path)?;
        config.network(&self.network)?;

        let store = FileRecordStore::new(&config.deployments_dir);
        let records = store.list(&self.network)?;
        if records.is_empty() {
            println!("No deployments recorded for `{}`", self.network);
            return Ok(());
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL).set_header(vec![
            "Name",
            "Address",
            "Implementation",
            "Contract",
            "Updated",
        ]);
        for (name, record) in records {
            let updated = chrono::DateTime::from_timestamp(record.updated_at, 0)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| record.updated_at.to_string());
            table.add_row(vec![
                name,
                record.address.to_string(),
                record
                    .implementation_address
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                record.artifact.contract_name,
                updated,
            ]);
        }
        println!("{table}");
        Ok(())
    }
}

#[derive(Args, Clone, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(&self, config_path: &Path) -> Result<()> {
        if config_path.exists() && !self.force {
            anyhow::bail!(
                "{} already exists, pass --force to overwrite it",
                config_path.display()
            );
        }
        PledgeConfig::default().save_to_file(config_path)
    }
}

fn validate_tags(tags: &[String], registry: &UnitRegistry) -> Result<()> {
    let known = registry.tags();
    for tag in tags {
        if !known.contains(tag.as_str()) {
            let known: Vec<&str> = known.iter().copied().collect();
            anyhow::bail!("Unknown tag `{tag}`, expected one of: {}", known.join(", "));
        }
    }
    Ok(())
}

fn describe(unit: &Unit) -> String {
    let strategy = match unit.strategy {
        Strategy::Plain { contract, .. } => format!("plain {contract}"),
        Strategy::Upgradeable { contract, .. } => format!("upgradeable {contract}"),
        Strategy::Upgrade { target, contract } => format!("upgrade {target} to {contract}"),
        Strategy::Wiring(calls) => format!("wiring, {} calls", calls.len()),
    };
    if unit.local_only {
        format!("{strategy}, local only")
    } else {
        strategy
    }
}

fn list_units() -> Result<()> {
    let registry = UnitRegistry::builtin().context("Invalid built-in unit table")?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Unit", "Tags", "Dependencies", "Strategy"]);
    for unit in registry.units() {
        table.add_row(vec![
            unit.name.to_string(),
            unit.tags.join(", "),
            unit.dependencies.join(", "),
            describe(unit),
        ]);
    }
    println!("{table}");
    Ok(())
}
