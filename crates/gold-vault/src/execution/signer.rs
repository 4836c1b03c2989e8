//! Signer seam.
//!
//! The engine never holds key material. A `TransactionSigner` takes an
//! unsigned request and returns the broadcast transaction hash.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::constants::EIP1193_USER_REJECTED;
use crate::errors::VaultError;
use crate::rpc::{eth, RpcClient};
use crate::types::TransactionRequest;

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign and broadcast. `SigningRejected` when the user declines.
    async fn sign(&self, tx: &TransactionRequest) -> Result<String, VaultError>;
}

/// Delegates to the connected node's wallet via `eth_sendTransaction`.
pub struct NodeSigner {
    rpc: Arc<dyn RpcClient>,
}

impl NodeSigner {
    pub fn new(rpc: Arc<dyn RpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl TransactionSigner for NodeSigner {
    async fn sign(&self, tx: &TransactionRequest) -> Result<String, VaultError> {
        match eth::send_transaction(self.rpc.as_ref(), tx).await {
            Ok(hash) => {
                info!(tx_hash = %hash, from = %tx.from, to = %tx.to, "transaction broadcast");
                Ok(hash)
            }
            Err(VaultError::ContractReverted { code, reason, .. }) if code == EIP1193_USER_REJECTED => {
                warn!(from = %tx.from, %reason, "signature rejected by wallet");
                Err(VaultError::SigningRejected { reason })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockRpc;
    use alloy::primitives::Address;

    fn tx() -> TransactionRequest {
        TransactionRequest::call(Address::repeat_byte(1), Address::repeat_byte(2), vec![0xab], 1)
    }

    #[tokio::test]
    async fn test_node_signer_returns_hash() {
        let rpc = Arc::new(MockRpc::new(1));
        let hash = NodeSigner::new(rpc.clone()).sign(&tx()).await.unwrap();
        assert!(hash.starts_with("0x"));
        assert_eq!(rpc.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_user_rejection_maps_to_signing_rejected() {
        let rpc = Arc::new(MockRpc::new(1));
        rpc.reject_sends("User denied transaction signature");

        let err = NodeSigner::new(rpc).sign(&tx()).await.unwrap_err();
        assert!(err.is_user_cancellation());
        assert!(matches!(err, VaultError::SigningRejected { ref reason } if reason.contains("denied")));
    }
}
