//! Post-deployment registration of contract addresses with each other.

use std::time::Duration;

use crate::{
    abi::Call,
    error::{DeployError, Result},
    network::NetworkProvider,
    store::{DeploymentRecord, RecordStore},
    unit::WiringCall,
};

/// The calls issued by one wiring pass, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WiringReport {
    pub calls: Vec<Call>,
}

fn record(store: &dyn RecordStore, name: &str, network: &str) -> Result<DeploymentRecord> {
    store
        .get(name, network)?
        .ok_or_else(|| DeployError::MissingRecord {
            name: name.to_string(),
            network: network.to_string(),
        })
}

/// Issue `calls` one at a time, each `target.function(peer address)`.
///
/// Every call is sent even when the chain already holds the right value, and each is confirmed
/// before the next is submitted. Records are read, never written.
pub async fn wire<N: NetworkProvider>(
    provider: &N,
    store: &dyn RecordStore,
    network: &str,
    calls: &[WiringCall],
    timeout: Duration,
) -> Result<WiringReport> {
    let mut report = WiringReport::default();

    for wiring in calls {
        let target = record(store, wiring.target, network)?;
        let peer = record(store, wiring.peer, network)?;

        let call = Call::new(target.artifact.contract_name.as_str(), wiring.function)
            .arg(peer.address);
        let receipt = provider
            .send_transaction(target.address, &call, timeout)
            .await?;

        tracing::info!(
            network,
            target = wiring.target,
            function = wiring.function,
            peer = %peer.address,
            tx_hash = %receipt.transaction_hash,
            "Wiring call confirmed"
        );
        report.calls.push(call);
    }

    Ok(report)
}
