//! Typed wrappers for the four `eth_*` methods the engine uses.

use alloy::primitives::Address;
use num_traits::ToPrimitive;
use serde_json::{json, Value};

use super::RpcClient;
use crate::abi::{parse_hex_bytes, parse_hex_quantity, to_hex};
use crate::constants::BLOCK_TAG_LATEST;
use crate::errors::VaultError;
use crate::types::{TransactionReceipt, TransactionRequest};

/// Read-only contract call against the latest block.
pub async fn eth_call(rpc: &dyn RpcClient, to: Address, data: &[u8]) -> Result<Vec<u8>, VaultError> {
    let params = json!([{ "to": to.to_string(), "data": to_hex(data) }, BLOCK_TAG_LATEST]);
    let result = rpc.request("eth_call", params).await?;
    let hex = result
        .as_str()
        .ok_or_else(|| VaultError::decoding("eth_call result is not a hex string"))?;
    parse_hex_bytes(hex)
}

/// Hand a transaction to the node's wallet for signing and broadcast.
pub async fn send_transaction(rpc: &dyn RpcClient, tx: &TransactionRequest) -> Result<String, VaultError> {
    let result = rpc
        .request("eth_sendTransaction", json!([tx.to_rpc_json()]))
        .await?;
    result
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| VaultError::decoding("eth_sendTransaction result is not a hash"))
}

/// `None` while the transaction is still pending.
pub async fn get_transaction_receipt(
    rpc: &dyn RpcClient,
    tx_hash: &str,
) -> Result<Option<TransactionReceipt>, VaultError> {
    let result = rpc
        .request("eth_getTransactionReceipt", json!([tx_hash]))
        .await?;
    match result {
        Value::Null => Ok(None),
        other => TransactionReceipt::from_json(&other).map(Some),
    }
}

pub async fn chain_id(rpc: &dyn RpcClient) -> Result<u64, VaultError> {
    let result = rpc.request("eth_chainId", json!([])).await?;
    let raw = result
        .as_str()
        .ok_or_else(|| VaultError::decoding("eth_chainId result is not a string"))?;
    parse_hex_quantity(raw)?
        .to_u64()
        .ok_or_else(|| VaultError::decoding(format!("chain id {raw} out of range")))
}
