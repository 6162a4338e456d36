//! End-to-end runs of the deployer against an in-memory chain.
//!
//! The mock chain tracks deployments, proxy implementations, initialization state and
//! contract versions, so the full deploy / reuse / upgrade / wire lifecycle can be checked
//! without a node.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use alloy_core::primitives::{Address, B256, Bytes, U256, address};
use pledge_deploy::{
    Arg, ArtifactMetadata, Call, ChainIdentity, DeployError, DeploymentRecord, Deployer,
    FileRecordStore, MemoryRecordStore, NetworkProfile, NetworkProvider, ProxyManager,
    RecordStore, Result, TxReceipt, Unit, UnitContext, UnitOutcome, UnitRegistry,
    UpgradeableMode, WiringCall, proxy::PROXY_CONTRACT,
};
use tempdir::TempDir;

const LOCALNET: &str = "localnet";
const LOCALNET_CHAIN_ID: u64 = 31415926;
const CALIBRATION_CHAIN_ID: u64 = 314159;
const CALIBRATION_WFIL: Address = address!("0xaC26a4Ab9cF2A8c5DBaB6fb4351ec0F4b07356c4");

#[derive(Default)]
struct ChainState {
    next_address: u8,
    code: HashMap<Address, String>,
    implementations: HashMap<Address, Address>,
    initialized: HashSet<Address>,
    deployments: Vec<(String, Vec<Arg>)>,
    /// Initializers run by proxy constructors.
    initializations: Vec<(Address, Call)>,
    transactions: Vec<(Address, Call)>,
    /// Functions whose next transaction is mined but never confirmed to the caller.
    unconfirmed: HashSet<String>,
}

/// In-memory chain answering the calls the deployer makes.
struct MockNetwork {
    profile: NetworkProfile,
    versions: HashMap<String, u64>,
    failing: HashSet<String>,
    state: Mutex<ChainState>,
}

impl MockNetwork {
    fn new(profile: NetworkProfile) -> Self {
        Self {
            profile,
            versions: HashMap::new(),
            failing: HashSet::new(),
            state: Mutex::default(),
        }
    }

    fn with_version(mut self, contract: &str, version: u64) -> Self {
        self.versions.insert(contract.to_string(), version);
        self
    }

    /// Make every deployment of `contract` revert.
    fn failing(mut self, contract: &str) -> Self {
        self.failing.insert(contract.to_string());
        self
    }

    /// Mine the next `function` transaction but report a confirmation timeout.
    fn unconfirmed(self, function: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .unconfirmed
            .insert(function.to_string());
        self
    }

    fn deployments(&self) -> Vec<(String, Vec<Arg>)> {
        self.state.lock().unwrap().deployments.clone()
    }

    fn initializations(&self) -> Vec<(Address, Call)> {
        self.state.lock().unwrap().initializations.clone()
    }

    fn transactions(&self) -> Vec<(Address, Call)> {
        self.state.lock().unwrap().transactions.clone()
    }

    fn implementation_of(&self, proxy: Address) -> Option<Address> {
        self.state.lock().unwrap().implementations.get(&proxy).copied()
    }

    fn version_at(&self, state: &ChainState, at: Address) -> Result<u64> {
        let code_at = state.implementations.get(&at).copied().unwrap_or(at);
        let contract = state
            .code
            .get(&code_at)
            .ok_or_else(|| DeployError::Abi(format!("no code at {at}")))?;
        Ok(self.versions.get(contract).copied().unwrap_or(1))
    }
}

impl ChainIdentity for MockNetwork {
    fn chain_id(&self) -> u64 {
        self.profile.chain_id
    }

    fn signer(&self) -> Address {
        address!("0x00000000000000000000000000000000000000aa")
    }

    fn resolve_known_address(&self, name: &str) -> Result<Address> {
        self.profile.known_address(name)
    }
}

impl NetworkProvider for MockNetwork {
    fn artifact(&self, contract: &str) -> Result<ArtifactMetadata> {
        Ok(ArtifactMetadata {
            contract_name: contract.to_string(),
            abi: serde_json::json!([]),
        })
    }

    /// Calldata is the JSON form of the call, so the proxy constructor can replay it.
    fn encode_call(&self, call: &Call) -> Result<Bytes> {
        serde_json::to_vec(call)
            .map(Bytes::from)
            .map_err(|e| DeployError::Abi(e.to_string()))
    }

    async fn deploy_contract(&self, contract: &str, args: &[Arg], _: Duration) -> Result<Address> {
        if self.failing.contains(contract) {
            return Err(DeployError::TransactionReverted {
                reason: format!("execution reverted: {contract} constructor"),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.next_address += 1;
        let deployed = Address::with_last_byte(state.next_address);
        state.code.insert(deployed, contract.to_string());
        if contract == PROXY_CONTRACT {
            let implementation = args[0].as_address()?;
            state.implementations.insert(deployed, implementation);
            if let Arg::Bytes(data) = &args[1] {
                if !data.is_empty() {
                    let init: Call = serde_json::from_slice(data)
                        .map_err(|e| DeployError::Abi(e.to_string()))?;
                    state.initialized.insert(deployed);
                    state.initializations.push((deployed, init));
                }
            }
        }
        state.deployments.push((contract.to_string(), args.to_vec()));
        Ok(deployed)
    }

    async fn send_transaction(&self, to: Address, call: &Call, timeout: Duration) -> Result<TxReceipt> {
        let mut state = self.state.lock().unwrap();
        match call.function.as_str() {
            "initialize" if !state.initialized.insert(to) => {
                return Err(DeployError::TransactionReverted {
                    reason: "execution reverted: Initializable: contract is already initialized"
                        .to_string(),
                });
            }
            "upgradeTo" => {
                let implementation = call.args[0].as_address()?;
                state.implementations.insert(to, implementation);
            }
            _ => {}
        }
        state.transactions.push((to, call.clone()));
        let transaction_hash = B256::with_last_byte(state.transactions.len() as u8);
        if state.unconfirmed.remove(&call.function) {
            return Err(DeployError::TransactionTimeout {
                tx_hash: transaction_hash,
                timeout,
            });
        }
        Ok(TxReceipt {
            transaction_hash,
            block_number: state.transactions.len() as u64,
            contract_address: None,
        })
    }

    async fn view(&self, to: Address, call: &Call) -> Result<Arg> {
        let state = self.state.lock().unwrap();
        match call.function.as_str() {
            "version" => Ok(Arg::Uint(U256::from(self.version_at(&state, to)?))),
            "getImplementation" => state
                .implementations
                .get(&to)
                .copied()
                .map(Arg::Address)
                .ok_or_else(|| DeployError::Abi(format!("{to} is not a proxy"))),
            other => Err(DeployError::Abi(format!("unexpected view {other}"))),
        }
    }
}

fn no_args(_: &UnitContext<'_>) -> Result<Vec<Arg>> {
    Ok(Vec::new())
}

fn registry_address(ctx: &UnitContext<'_>) -> Result<Vec<Arg>> {
    Ok(vec![ctx.address_of("Registry")?.into()])
}

const WIRING: &[WiringCall] = &[
    WiringCall::new("Collateral", "setRegistryAddress", "Registry"),
    WiringCall::new("Registry", "registerPool", "Staking"),
];

/// Three contracts and the wiring unit tying them together.
fn small_registry() -> UnitRegistry {
    UnitRegistry::new(vec![
        Unit::plain("Registry", "Registry", no_args).tags(&["Registry"]),
        Unit::upgradeable("Collateral", "Collateral", registry_address)
            .tags(&["Collateral"])
            .depends_on(&["Registry"]),
        Unit::upgradeable("Staking", "Staking", no_args).tags(&["Staking"]),
        Unit::wiring("Integration", WIRING)
            .tags(&["Integration"])
            .depends_on(&["Registry", "Collateral", "Staking"]),
    ])
    .expect("test units are valid")
}

fn localnet() -> NetworkProfile {
    NetworkProfile::new(LOCALNET_CHAIN_ID).local()
}

fn calibration() -> NetworkProfile {
    NetworkProfile::new(CALIBRATION_CHAIN_ID)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_first_run_deploys_then_rerun_only_wires() {
    init_tracing();
    let registry = small_registry();
    let network = MockNetwork::new(localnet());
    let store = MemoryRecordStore::new();
    let deployer = Deployer::new(LOCALNET, localnet(), &network, &store, &registry).unwrap();

    let order: Vec<&str> = deployer
        .plan(&["Integration"])
        .unwrap()
        .iter()
        .map(|u| u.name)
        .collect();
    assert_eq!(order, vec!["Registry", "Collateral", "Staking", "Integration"]);

    let first = deployer.run(&["Integration"]).await.unwrap();
    assert_eq!(first.deployed(), 3);
    assert_eq!(first.wiring_calls(), 2);
    assert_eq!(store.len(), 3);
    let deployments_after_first = network.deployments().len();
    // One plain contract, two implementation + proxy pairs.
    assert_eq!(deployments_after_first, 5);

    let registry_address = store.get("Registry", LOCALNET).unwrap().unwrap().address;

    let second = deployer.run(&["Integration"]).await.unwrap();
    assert_eq!(second.deployed(), 0);
    assert_eq!(second.reused(), 3);
    assert_eq!(second.wiring_calls(), 2);
    assert_eq!(network.deployments().len(), deployments_after_first);
    assert_eq!(
        store.get("Registry", LOCALNET).unwrap().unwrap().address,
        registry_address
    );

    let wiring: Vec<String> = network
        .transactions()
        .into_iter()
        .map(|(_, call)| call.function)
        .collect();
    assert_eq!(
        wiring,
        vec![
            "setRegistryAddress",
            "registerPool",
            "setRegistryAddress",
            "registerPool"
        ]
    );
}

#[tokio::test]
async fn test_proxy_record_and_initializer_arguments() {
    let registry = small_registry();
    let network = MockNetwork::new(localnet());
    let store = MemoryRecordStore::new();
    let deployer = Deployer::new(LOCALNET, localnet(), &network, &store, &registry).unwrap();

    deployer.run(&["Collateral"]).await.unwrap();

    let registry_record = store.get("Registry", LOCALNET).unwrap().unwrap();
    let collateral = store.get("Collateral", LOCALNET).unwrap().unwrap();
    assert!(!registry_record.is_proxy());
    assert!(collateral.is_proxy());
    assert_eq!(
        network.implementation_of(collateral.address),
        collateral.implementation_address
    );

    // Initialized by the proxy constructor, never by a separate transaction.
    let (proxy_contract, proxy_args) = network.deployments().pop().unwrap();
    assert_eq!(proxy_contract, PROXY_CONTRACT);
    assert!(matches!(&proxy_args[1], Arg::Bytes(data) if !data.is_empty()));
    assert!(network.transactions().is_empty());

    let (to, init) = network.initializations().pop().unwrap();
    assert_eq!(to, collateral.address);
    assert_eq!(init.contract, "Collateral");
    assert_eq!(init.function, "initialize");
    assert_eq!(init.args, vec![Arg::Address(registry_record.address)]);
}

#[tokio::test]
async fn test_records_survive_a_new_process() {
    let temp_dir = TempDir::new("pledge-run").expect("Failed to create temp dir");
    let registry = small_registry();
    let network = MockNetwork::new(localnet());

    {
        let store = FileRecordStore::new(temp_dir.path());
        let _lock = store.lock(LOCALNET).unwrap();
        let deployer = Deployer::new(LOCALNET, localnet(), &network, &store, &registry).unwrap();
        deployer.run(&["Integration"]).await.unwrap();
    }

    let store = FileRecordStore::new(temp_dir.path());
    let _lock = store.lock(LOCALNET).unwrap();
    let deployer = Deployer::new(LOCALNET, localnet(), &network, &store, &registry).unwrap();
    let report = deployer.run(&["Integration"]).await.unwrap();

    assert_eq!(report.deployed(), 0);
    assert_eq!(report.reused(), 3);
    assert_eq!(store.list(LOCALNET).unwrap().len(), 3);
}

#[tokio::test]
async fn test_builtin_units_on_localnet() {
    let registry = UnitRegistry::builtin().unwrap();
    let network = MockNetwork::new(localnet())
        .with_version("RewardCollector", 1)
        .with_version("RewardCollectorV2", 2);
    let store = MemoryRecordStore::new();
    let deployer = Deployer::new(LOCALNET, localnet(), &network, &store, &registry).unwrap();

    let report = deployer.run(&["Integration"]).await.unwrap();
    assert_eq!(report.deployed(), 8);
    assert_eq!(report.wiring_calls(), 7);

    // The stand-in token is handed to every contract that needs wrapped FIL.
    let wfil = store.get("WFIL", LOCALNET).unwrap().unwrap().address;
    let reward_init = network
        .initializations()
        .into_iter()
        .find(|(_, call)| call.contract == "RewardCollector")
        .map(|(_, call)| call)
        .unwrap();
    assert_eq!(reward_init.args[0], Arg::Address(wfil));

    let before = store.get("RewardCollector", LOCALNET).unwrap().unwrap();
    let report = deployer.run(&["RewardCollectorV2"]).await.unwrap();
    let Some(UnitOutcome::Upgraded {
        proxy,
        implementation,
    }) = report.outcome("RewardCollectorV2").cloned()
    else {
        panic!("expected an upgrade, got {report}");
    };

    let after = store.get("RewardCollector", LOCALNET).unwrap().unwrap();
    assert_eq!(proxy, before.address);
    assert_eq!(after.address, before.address);
    assert_ne!(after.implementation_address, before.implementation_address);
    assert_eq!(after.implementation_address, Some(implementation));
    assert_eq!(after.artifact.contract_name, "RewardCollectorV2");
    assert_eq!(after.created_at, before.created_at);

    // Already upgraded: nothing left to do.
    let report = deployer.run(&["RewardCollectorV2"]).await.unwrap();
    assert!(matches!(
        report.outcome("RewardCollectorV2"),
        Some(UnitOutcome::Reused { .. })
    ));
    assert_eq!(report.upgraded(), 0);
}

#[tokio::test]
async fn test_upgrade_requires_increasing_version() {
    let registry = UnitRegistry::builtin().unwrap();
    let network = MockNetwork::new(localnet())
        .with_version("RewardCollector", 2)
        .with_version("RewardCollectorV2", 2);
    let store = MemoryRecordStore::new();
    let deployer = Deployer::new(LOCALNET, localnet(), &network, &store, &registry).unwrap();

    deployer.run(&["Integration"]).await.unwrap();
    let before = store.get("RewardCollector", LOCALNET).unwrap().unwrap();

    let err = deployer.run(&["RewardCollectorV2"]).await.unwrap_err();
    assert!(matches!(
        err,
        DeployError::Unit { ref unit, .. } if unit == "RewardCollectorV2"
    ));
    assert!(matches!(
        err.root(),
        DeployError::UpgradeVersion { current, candidate }
            if *current == U256::from(2) && *candidate == U256::from(2)
    ));

    assert_eq!(store.get("RewardCollector", LOCALNET).unwrap().unwrap(), before);
    assert_eq!(
        network.implementation_of(before.address),
        before.implementation_address
    );
    assert!(
        network
            .transactions()
            .iter()
            .all(|(_, call)| call.function != "upgradeTo")
    );
}

#[tokio::test]
async fn test_unrecorded_upgrade_is_picked_up_on_rerun() {
    let registry = UnitRegistry::builtin().unwrap();
    let network = MockNetwork::new(localnet())
        .with_version("RewardCollector", 1)
        .with_version("RewardCollectorV2", 2)
        .unconfirmed("upgradeTo");
    let store = MemoryRecordStore::new();
    let deployer = Deployer::new(LOCALNET, localnet(), &network, &store, &registry).unwrap();

    deployer.run(&["Integration"]).await.unwrap();
    let before = store.get("RewardCollector", LOCALNET).unwrap().unwrap();

    // upgradeTo is mined, but the run gives up waiting for it.
    let err = deployer.run(&["RewardCollectorV2"]).await.unwrap_err();
    assert!(matches!(err.root(), DeployError::TransactionTimeout { .. }));
    assert_eq!(store.get("RewardCollector", LOCALNET).unwrap().unwrap(), before);
    let landed = network.implementation_of(before.address).unwrap();
    assert_ne!(Some(landed), before.implementation_address);

    let report = deployer.run(&["RewardCollectorV2"]).await.unwrap();
    assert_eq!(
        report.outcome("RewardCollectorV2"),
        Some(&UnitOutcome::Upgraded {
            proxy: before.address,
            implementation: landed,
        })
    );
    let after = store.get("RewardCollector", LOCALNET).unwrap().unwrap();
    assert_eq!(after.implementation_address, Some(landed));
    assert_eq!(after.artifact.contract_name, "RewardCollectorV2");

    // The implementation was deployed once, and no second upgrade was sent.
    let v2_deployments = network
        .deployments()
        .iter()
        .filter(|(contract, _)| contract == "RewardCollectorV2")
        .count();
    assert_eq!(v2_deployments, 1);
    let upgrades = network
        .transactions()
        .iter()
        .filter(|(_, call)| call.function == "upgradeTo")
        .count();
    assert_eq!(upgrades, 1);
}

#[tokio::test]
async fn test_upgrading_a_plain_record_is_rejected() {
    let registry = UnitRegistry::builtin().unwrap();
    let profile = localnet().with_upgradeable_mode(UpgradeableMode::Plain);
    let network = MockNetwork::new(profile.clone());
    let store = MemoryRecordStore::new();
    let deployer = Deployer::new(LOCALNET, profile, &network, &store, &registry).unwrap();

    let err = deployer.run(&["RewardCollectorV2"]).await.unwrap_err();
    assert!(matches!(err.root(), DeployError::NotAProxy { name, .. } if name == "RewardCollector"));
}

#[tokio::test]
async fn test_missing_known_address_fails_before_any_transaction() {
    let registry = UnitRegistry::builtin().unwrap();
    let network = MockNetwork::new(calibration());
    let store = MemoryRecordStore::new();
    let deployer =
        Deployer::new("calibration", calibration(), &network, &store, &registry).unwrap();

    let err = deployer.run(&["Staking"]).await.unwrap_err();
    assert!(matches!(
        err.root(),
        DeployError::NotConfigured { name, chain_id: CALIBRATION_CHAIN_ID } if name == "WFIL"
    ));
    assert!(network.deployments().is_empty());
    assert!(network.transactions().is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_local_only_units_are_skipped_on_live_networks() {
    let registry = UnitRegistry::builtin().unwrap();
    let profile = calibration().with_known_address("WFIL", CALIBRATION_WFIL);
    let network = MockNetwork::new(profile.clone());
    let store = MemoryRecordStore::new();
    let deployer = Deployer::new("calibration", profile, &network, &store, &registry).unwrap();

    let report = deployer.run(&["RewardCollector"]).await.unwrap();
    assert_eq!(report.outcome("WFIL"), Some(&UnitOutcome::Skipped));
    assert!(!store.exists("WFIL", "calibration").unwrap());

    let init = network
        .initializations()
        .into_iter()
        .find(|(_, call)| call.contract == "RewardCollector")
        .map(|(_, call)| call)
        .unwrap();
    assert_eq!(init.args[0], Arg::Address(CALIBRATION_WFIL));
    assert!(network.deployments().iter().all(|(c, _)| c != "WFIL"));
}

#[tokio::test]
async fn test_revert_propagates_without_a_record() {
    let registry = small_registry();
    let network = MockNetwork::new(localnet()).failing("Staking");
    let store = MemoryRecordStore::new();
    let deployer = Deployer::new(LOCALNET, localnet(), &network, &store, &registry).unwrap();

    let err = deployer.run(&["Integration"]).await.unwrap_err();
    assert!(matches!(
        err,
        DeployError::Unit { ref unit, ref network, .. } if unit == "Staking" && network == LOCALNET
    ));
    assert!(matches!(err.root(), DeployError::TransactionReverted { .. }));

    assert!(store.exists("Registry", LOCALNET).unwrap());
    assert!(store.exists("Collateral", LOCALNET).unwrap());
    assert!(!store.exists("Staking", LOCALNET).unwrap());
    assert!(network.transactions().is_empty());
}

#[tokio::test]
async fn test_plain_mode_passes_arguments_to_constructor() {
    let registry = small_registry();
    let profile = localnet().with_upgradeable_mode(UpgradeableMode::Plain);
    let network = MockNetwork::new(profile.clone());
    let store = MemoryRecordStore::new();
    let deployer = Deployer::new(LOCALNET, profile, &network, &store, &registry).unwrap();

    deployer.run(&["Collateral"]).await.unwrap();

    let registry_address = store.get("Registry", LOCALNET).unwrap().unwrap().address;
    let collateral = store.get("Collateral", LOCALNET).unwrap().unwrap();
    assert!(!collateral.is_proxy());
    assert_eq!(
        network.deployments(),
        vec![
            ("Registry".to_string(), vec![]),
            ("Collateral".to_string(), vec![Arg::Address(registry_address)]),
        ]
    );
    assert!(network.transactions().is_empty());
    assert!(network.initializations().is_empty());
}

#[tokio::test]
async fn test_second_initialization_is_an_error() {
    let network = MockNetwork::new(localnet());
    let proxies = ProxyManager::new(&network, Duration::from_secs(1), Duration::from_secs(1));

    let deployment = proxies
        .deploy_proxy("Resolver", &[])
        .await
        .expect("deployed and initialized");
    assert_eq!(network.initializations().len(), 1);

    let err = proxies
        .initialize("Resolver", deployment.proxy, &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DeployError::AlreadyInitialized { proxy } if proxy == deployment.proxy
    ));
}

#[tokio::test]
async fn test_wiring_needs_every_record() {
    let network = MockNetwork::new(localnet());
    let store = MemoryRecordStore::new();
    store
        .put(
            "Registry",
            LOCALNET,
            &DeploymentRecord::plain(
                Address::with_last_byte(0x42),
                network.artifact("Registry").unwrap(),
            ),
        )
        .unwrap();

    let err = pledge_deploy::wire(&network, &store, LOCALNET, WIRING, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::MissingRecord { ref name, .. } if name == "Collateral"));
    assert!(network.transactions().is_empty());
}

#[test]
fn test_chain_mismatch_is_rejected() {
    let registry = small_registry();
    let network = MockNetwork::new(calibration());
    let store = MemoryRecordStore::new();

    let result = Deployer::new(LOCALNET, localnet(), &network, &store, &registry);
    assert!(matches!(
        result,
        Err(DeployError::ChainMismatch {
            expected: LOCALNET_CHAIN_ID,
            actual: CALIBRATION_CHAIN_ID
        })
    ));
}
