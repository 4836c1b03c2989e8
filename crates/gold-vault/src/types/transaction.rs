use std::str::FromStr;

use alloy::primitives::{Address, B256};
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use serde_json::{json, Value};

use crate::abi::{parse_hex_bytes, parse_hex_quantity, to_hex};
use crate::errors::VaultError;

/// Unsigned transaction handed to the signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
    pub value: BigUint,
    pub chain_id: u64,
}

impl TransactionRequest {
    pub fn call(from: Address, to: Address, data: Vec<u8>, chain_id: u64) -> Self {
        Self {
            from,
            to,
            data,
            value: BigUint::zero(),
            chain_id,
        }
    }

    /// JSON-RPC transaction object (`eth_call` / `eth_sendTransaction`).
    pub fn to_rpc_json(&self) -> Value {
        json!({
            "from": self.from.to_string(),
            "to": self.to.to_string(),
            "data": to_hex(&self.data),
            "value": format!("0x{}", self.value.to_str_radix(16)),
            "chainId": format!("0x{:x}", self.chain_id),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
}

/// Mined transaction outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub tx_hash: String,
    pub success: bool,
    pub block_number: Option<u64>,
    pub logs: Vec<LogEntry>,
}

impl TransactionReceipt {
    /// Parse an `eth_getTransactionReceipt` result object.
    pub fn from_json(value: &Value) -> Result<Self, VaultError> {
        let field = |name: &str| -> Result<&str, VaultError> {
            value
                .get(name)
                .and_then(Value::as_str)
                .ok_or_else(|| VaultError::decoding(format!("receipt missing {name}")))
        };

        let tx_hash = field("transactionHash")?.to_string();
        let status = parse_hex_quantity(field("status")?)?;
        let block_number = match value.get("blockNumber").and_then(Value::as_str) {
            Some(raw) => Some(parse_hex_quantity(raw)?.to_u64().ok_or_else(|| {
                VaultError::decoding(format!("block number {raw} out of range"))
            })?),
            None => None,
        };

        let logs = value
            .get("logs")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(parse_log).collect::<Result<Vec<_>, _>>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            tx_hash,
            success: status == BigUint::from(1u8),
            block_number,
            logs,
        })
    }
}

fn parse_log(entry: &Value) -> Result<LogEntry, VaultError> {
    let address = entry
        .get("address")
        .and_then(Value::as_str)
        .ok_or_else(|| VaultError::decoding("log missing address"))
        .and_then(|s| {
            Address::from_str(s).map_err(|e| VaultError::decoding(format!("log address {s}: {e}")))
        })?;

    let topics = entry
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| VaultError::decoding("log missing topics"))?
        .iter()
        .map(|t| {
            let s = t
                .as_str()
                .ok_or_else(|| VaultError::decoding("log topic is not a string"))?;
            B256::from_str(s).map_err(|e| VaultError::decoding(format!("log topic {s}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let data = match entry.get("data").and_then(Value::as_str) {
        Some(s) => parse_hex_bytes(s)?,
        None => Vec::new(),
    };

    Ok(LogEntry {
        address,
        topics,
        data,
    })
}
