//! Shared helpers for talking to Ethereum JSON-RPC endpoints.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, U64};
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    abi::TxReceipt,
    error::{DeployError, Result},
};

/// Default timeout for a single RPC request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between receipt polls while waiting for confirmation.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| DeployError::Rpc {
            method: "client".to_string(),
            message: e.to_string(),
        })
}

/// Make a JSON-RPC call and deserialize the result.
///
/// Error responses that report an execution revert become
/// [`DeployError::TransactionReverted`] so callers can tell a rejected transaction apart from
/// a broken endpoint.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T> {
    let rpc_err = |message: String| DeployError::Rpc {
        method: method.to_string(),
        message,
    };

    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .map_err(|e| rpc_err(format!("failed to send request: {e}")))?;

    let result: Value = response
        .json()
        .await
        .map_err(|e| rpc_err(format!("failed to parse response: {e}")))?;

    if let Some(error) = result.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown")
            .to_string();
        if message.contains("revert") {
            return Err(DeployError::TransactionReverted { reason: message });
        }
        return Err(rpc_err(message));
    }

    let result_value = result
        .get("result")
        .cloned()
        .ok_or_else(|| rpc_err("no result in response".to_string()))?;

    serde_json::from_value(result_value)
        .map_err(|e| rpc_err(format!("failed to deserialize result: {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: U64,
    status: Option<U64>,
    contract_address: Option<Address>,
}

enum Poll {
    Pending,
    Failed(DeployError),
}

/// Wait for a transaction to be mined.
///
/// Only the receipt lookup is repeated; the transaction itself is never resubmitted. A receipt
/// with status `0` is reported as [`DeployError::TransactionReverted`].
pub async fn wait_for_receipt(
    client: &reqwest::Client,
    url: &str,
    tx_hash: B256,
    timeout: Duration,
) -> Result<TxReceipt> {
    let delay = RECEIPT_POLL_INTERVAL.min(timeout);
    let attempts = (timeout.as_millis() / delay.as_millis().max(1)) as usize + 1;

    let fetch = || async move {
        let receipt: Option<RpcReceipt> = json_rpc_call(
            client,
            url,
            "eth_getTransactionReceipt",
            vec![serde_json::json!(tx_hash)],
        )
        .await
        .map_err(Poll::Failed)?;
        receipt.ok_or(Poll::Pending)
    };

    let receipt = fetch
        .retry(
            ConstantBuilder::default()
                .with_delay(delay)
                .with_max_times(attempts),
        )
        .when(|e: &Poll| matches!(e, Poll::Pending))
        .notify(|_: &Poll, _| tracing::trace!(%tx_hash, "Receipt not available yet, polling..."))
        .await
        .map_err(|e| match e {
            Poll::Pending => DeployError::TransactionTimeout { tx_hash, timeout },
            Poll::Failed(err) => err,
        })?;

    if receipt.status == Some(U64::ZERO) {
        return Err(DeployError::TransactionReverted {
            reason: format!("transaction {tx_hash} failed on-chain"),
        });
    }

    Ok(TxReceipt {
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number.to::<u64>(),
        contract_address: receipt.contract_address,
    })
}
