//! Receipt polling with a hard deadline.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::TimingConfig;
use crate::errors::VaultError;
use crate::rpc::{eth, RpcClient};
use crate::types::TransactionReceipt;

#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl ConfirmationPolicy {
    pub fn from_config(timing: &TimingConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(timing.receipt_poll_interval_ms),
            timeout: Duration::from_secs(timing.confirmation_timeout_seconds),
        }
    }
}

/// Poll until the transaction is mined.
///
/// Returns `TxReverted` for a mined failure and `ConfirmationTimeout` once
/// the deadline passes. Poll errors are logged and retried until then.
pub async fn wait_for_receipt(
    rpc: &dyn RpcClient,
    tx_hash: &str,
    policy: ConfirmationPolicy,
) -> Result<TransactionReceipt, VaultError> {
    let start = tokio::time::Instant::now();

    loop {
        match eth::get_transaction_receipt(rpc, tx_hash).await {
            Ok(Some(receipt)) => {
                if !receipt.success {
                    warn!(tx_hash, block = ?receipt.block_number, "transaction reverted");
                    return Err(VaultError::TxReverted {
                        tx_hash: tx_hash.to_string(),
                    });
                }
                info!(tx_hash, block = ?receipt.block_number, "transaction confirmed");
                return Ok(receipt);
            }
            Ok(None) => debug!(tx_hash, "receipt pending"),
            Err(e) => warn!(error = %e, tx_hash, "receipt poll error, retrying"),
        }

        if start.elapsed() >= policy.timeout {
            return Err(VaultError::ConfirmationTimeout {
                tx_hash: tx_hash.to_string(),
                timeout_seconds: policy.timeout.as_secs(),
            });
        }

        tokio::time::sleep(policy.poll_interval).await;
    }
}
