//! [`NetworkProvider`] backed by an Ethereum JSON-RPC node.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt},
    json_abi::{Function, JsonAbi},
    primitives::{Address, B256, Bytes, U64},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ChainIdentity, NetworkProfile, NetworkProvider};
use crate::{
    abi::{Arg, ArtifactMetadata, Call, TxReceipt},
    error::{DeployError, Result},
    rpc::{create_client, json_rpc_call, wait_for_receipt},
};

/// Hardhat keeps per-compilation inputs here, never contract artifacts.
const BUILD_INFO_DIR: &str = "build-info";

/// A compiled Hardhat artifact (`artifacts/<source path>/<Name>.json`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    abi: Value,
    bytecode: Bytes,
}

impl HardhatArtifact {
    fn json_abi(&self) -> Result<JsonAbi> {
        serde_json::from_value(self.abi.clone())
            .map_err(|e| DeployError::artifact(&self.contract_name, format!("invalid ABI: {e}")))
    }
}

/// Submits transactions from the profile's `from` account through `eth_sendTransaction`.
///
/// Signing happens on the node, so the tool never sees key material. Artifacts are looked up
/// by contract name anywhere under the compiled artifacts directory, on every use.
pub struct RpcNetwork {
    profile: NetworkProfile,
    url: String,
    from: Address,
    artifacts_dir: PathBuf,
    client: reqwest::Client,
}

impl RpcNetwork {
    /// Connect to the profile's endpoint and check that it serves the expected chain.
    pub async fn connect(profile: NetworkProfile, artifacts_dir: impl Into<PathBuf>) -> Result<Self> {
        let not_configured = |name: &str| DeployError::NotConfigured {
            name: name.to_string(),
            chain_id: profile.chain_id,
        };
        let url = profile
            .rpc_url
            .as_ref()
            .ok_or_else(|| not_configured("rpc_url"))?
            .to_string();
        let from = profile.from.ok_or_else(|| not_configured("from"))?;
        let client = create_client()?;

        let actual: U64 = json_rpc_call(&client, &url, "eth_chainId", vec![]).await?;
        let actual = actual.to::<u64>();
        if actual != profile.chain_id {
            return Err(DeployError::ChainMismatch {
                expected: profile.chain_id,
                actual,
            });
        }

        tracing::info!(chain_id = actual, %from, "Connected to network");

        Ok(Self {
            profile,
            url,
            from,
            artifacts_dir: artifacts_dir.into(),
            client,
        })
    }

    fn load_artifact(&self, contract: &str) -> Result<HardhatArtifact> {
        let file_name = format!("{contract}.json");
        let mut found = Vec::new();
        find_artifacts(&self.artifacts_dir, &file_name, &mut found)
            .map_err(|e| {
                DeployError::artifact(
                    contract,
                    format!("failed to search {}: {e}", self.artifacts_dir.display()),
                )
            })?;

        let path = match found.as_slice() {
            [path] => path,
            [] => {
                return Err(DeployError::artifact(
                    contract,
                    format!("no {file_name} under {}", self.artifacts_dir.display()),
                ));
            }
            many => {
                let paths: Vec<String> = many.iter().map(|p| p.display().to_string()).collect();
                return Err(DeployError::artifact(
                    contract,
                    format!("ambiguous name, found {}", paths.join(", ")),
                ));
            }
        };

        let content = fs::read_to_string(path).map_err(|e| {
            DeployError::artifact(contract, format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| DeployError::artifact(contract, format!("failed to parse: {e}")))
    }

    fn function(&self, call: &Call) -> Result<Function> {
        let abi = self.load_artifact(&call.contract)?.json_abi()?;
        abi.function(&call.function)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == call.args.len()))
            .cloned()
            .ok_or_else(|| {
                DeployError::Abi(format!(
                    "{} has no function {} taking {} arguments",
                    call.contract,
                    call.function,
                    call.args.len()
                ))
            })
    }

    fn encode_function(&self, call: &Call) -> Result<(Function, Bytes)> {
        let function = self.function(call)?;
        let values: Vec<DynSolValue> = call.args.iter().map(Arg::to_sol).collect();
        let data = function
            .abi_encode_input(&values)
            .map_err(|e| DeployError::Abi(format!("failed to encode {call}: {e}")))?;
        Ok((function, data.into()))
    }

    async fn submit(&self, to: Option<Address>, data: Bytes, timeout: Duration) -> Result<TxReceipt> {
        let mut tx = json!({ "from": self.from, "data": data });
        if let Some(to) = to {
            tx["to"] = json!(to);
        }

        let tx_hash: B256 =
            json_rpc_call(&self.client, &self.url, "eth_sendTransaction", vec![tx]).await?;
        tracing::debug!(%tx_hash, ?to, "Transaction submitted");

        wait_for_receipt(&self.client, &self.url, tx_hash, timeout).await
    }
}

/// Collect every `file_name` below `dir`, in a stable order. Skips build info.
fn find_artifacts(dir: &Path, file_name: &str, found: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            if path.file_name().is_some_and(|name| name != BUILD_INFO_DIR) {
                find_artifacts(&path, file_name, found)?;
            }
        } else if path.file_name().is_some_and(|name| name == file_name) {
            found.push(path);
        }
    }
    Ok(())
}

impl ChainIdentity for RpcNetwork {
    fn chain_id(&self) -> u64 {
        self.profile.chain_id
    }

    fn signer(&self) -> Address {
        self.from
    }

    fn resolve_known_address(&self, name: &str) -> Result<Address> {
        self.profile.known_address(name)
    }
}

impl NetworkProvider for RpcNetwork {
    fn artifact(&self, contract: &str) -> Result<ArtifactMetadata> {
        let artifact = self.load_artifact(contract)?;
        Ok(ArtifactMetadata {
            contract_name: artifact.contract_name,
            abi: artifact.abi,
        })
    }

    fn encode_call(&self, call: &Call) -> Result<Bytes> {
        self.encode_function(call).map(|(_, data)| data)
    }

    async fn deploy_contract(&self, contract: &str, args: &[Arg], timeout: Duration) -> Result<Address> {
        let artifact = self.load_artifact(contract)?;
        let abi = artifact.json_abi()?;

        let encoded_args = match abi.constructor() {
            Some(constructor) => {
                let values: Vec<DynSolValue> = args.iter().map(Arg::to_sol).collect();
                constructor.abi_encode_input(&values).map_err(|e| {
                    DeployError::Abi(format!("failed to encode {contract} constructor: {e}"))
                })?
            }
            None if args.is_empty() => Vec::new(),
            None => {
                return Err(DeployError::Abi(format!(
                    "{contract} has no constructor but {} arguments were given",
                    args.len()
                )));
            }
        };

        let mut data = artifact.bytecode.to_vec();
        data.extend_from_slice(&encoded_args);

        let receipt = self.submit(None, data.into(), timeout).await?;
        receipt.contract_address.ok_or_else(|| DeployError::Rpc {
            method: "eth_getTransactionReceipt".to_string(),
            message: format!(
                "receipt {} has no contract address",
                receipt.transaction_hash
            ),
        })
    }

    async fn send_transaction(&self, to: Address, call: &Call, timeout: Duration) -> Result<TxReceipt> {
        let data = self.encode_call(call)?;
        self.submit(Some(to), data, timeout).await
    }

    async fn view(&self, to: Address, call: &Call) -> Result<Arg> {
        let (function, data) = self.encode_function(call)?;
        let output: Bytes = json_rpc_call(
            &self.client,
            &self.url,
            "eth_call",
            vec![json!({ "from": self.from, "to": to, "data": data }), json!("latest")],
        )
        .await?;

        let mut values = function
            .abi_decode_output(&output, true)
            .map_err(|e| DeployError::Abi(format!("failed to decode {call} output: {e}")))?;
        if values.is_empty() {
            return Err(DeployError::Abi(format!("{call} returned nothing")));
        }
        Arg::from_sol(values.swap_remove(0))
    }
}
