//! Scripted fakes for the engine's seams.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::Address;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use num_bigint::BigUint;
use serde_json::{json, Value};

use crate::abi::{parse_hex_bytes, to_hex, ContractSelectors, Selector};
use crate::constants::EIP1193_USER_REJECTED;
use crate::core::price::PriceSource;
use crate::core::session::SessionContext;
use crate::errors::VaultError;
use crate::execution::TransactionSigner;
use crate::rpc::RpcClient;
use crate::types::{PriceQuote, TokenInfo, TokenPair, TransactionRequest};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn paxg() -> TokenInfo {
    TokenInfo {
        symbol: "PAXG".into(),
        address: Address::repeat_byte(0x45),
        decimals: 18,
    }
}

pub fn usdc() -> TokenInfo {
    TokenInfo {
        symbol: "USDC".into(),
        address: Address::repeat_byte(0xa0),
        decimals: 6,
    }
}

pub fn pair() -> TokenPair {
    TokenPair {
        collateral: paxg(),
        debt: usdc(),
    }
}

/// Vault `0x0f..`, resolver `0x39..`, no rate resolver.
pub fn session_context() -> SessionContext {
    SessionContext {
        chain_id: 1,
        vault: Address::repeat_byte(0x0f),
        vault_resolver: Address::repeat_byte(0x39),
        rate_resolver: None,
        tokens: pair(),
        selectors: Arc::new(ContractSelectors::default()),
    }
}

pub fn uint_word(v: &BigUint) -> Vec<u8> {
    let bytes = v.to_bytes_be();
    let mut word = vec![0u8; 32 - bytes.len()];
    word.extend_from_slice(&bytes);
    word
}

fn topic(addr: Address) -> String {
    addr.into_word().to_string()
}

/// ERC-721 `Transfer(from, to, tokenId)` log object.
pub fn transfer_log(emitter: Address, from: Address, to: Address, token_id: u64) -> Value {
    json!({
        "address": emitter.to_string(),
        "topics": [
            ContractSelectors::default().transfer_topic.to_string(),
            topic(from),
            topic(to),
            format!("0x{token_id:064x}"),
        ],
        "data": "0x",
    })
}

pub fn receipt(tx_hash: &str, success: bool, logs: Vec<Value>) -> Value {
    json!({
        "transactionHash": tx_hash,
        "status": if success { "0x1" } else { "0x0" },
        "blockNumber": "0x1234",
        "logs": logs,
    })
}

// ---------------------------------------------------------------------------
// MockRpc
// ---------------------------------------------------------------------------

enum Route {
    Data(Vec<u8>),
    Revert(String),
}

/// In-memory node. `eth_call` is routed by `(to, selector)`; unrouted calls
/// revert. Receipts are `null` until set.
pub struct MockRpc {
    chain_id: u64,
    routes: Mutex<HashMap<(Address, [u8; 4]), Route>>,
    receipts: Mutex<HashMap<String, Value>>,
    sent: Mutex<Vec<Value>>,
    reject_sends: Mutex<Option<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockRpc {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            routes: Mutex::new(HashMap::new()),
            receipts: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            reject_sends: Mutex::new(None),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_call(&self, to: Address, selector: Selector, output: Vec<u8>) {
        self.routes
            .lock()
            .unwrap()
            .insert((to, selector.0), Route::Data(output));
    }

    pub fn on_revert(&self, to: Address, selector: Selector, reason: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert((to, selector.0), Route::Revert(reason.to_string()));
    }

    pub fn set_receipt(&self, receipt: Value) {
        let hash = receipt["transactionHash"].as_str().unwrap().to_string();
        self.receipts.lock().unwrap().insert(hash, receipt);
    }

    pub fn reject_sends(&self, message: &str) {
        *self.reject_sends.lock().unwrap() = Some(message.to_string());
    }

    /// Transaction objects passed to `eth_sendTransaction`.
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls_for(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    fn eth_call(&self, params: &Value) -> Result<Value, VaultError> {
        let to = Address::from_str(params[0]["to"].as_str().unwrap()).unwrap();
        let data = parse_hex_bytes(params[0]["data"].as_str().unwrap()).unwrap();
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);

        match self.routes.lock().unwrap().get(&(to, selector)) {
            Some(Route::Data(out)) => Ok(json!(to_hex(out))),
            Some(Route::Revert(reason)) => Err(VaultError::ContractReverted {
                code: 3,
                reason: reason.clone(),
                data: None,
            }),
            None => Err(VaultError::ContractReverted {
                code: -32000,
                reason: format!("no route for {to} 0x{}", hex::encode(selector)),
                data: None,
            }),
        }
    }
}

#[async_trait]
impl RpcClient for MockRpc {
    async fn request(&self, method: &str, params: Value) -> Result<Value, VaultError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default() += 1;

        match method {
            "eth_chainId" => Ok(json!(format!("0x{:x}", self.chain_id))),
            "eth_call" => self.eth_call(&params),
            "eth_getTransactionReceipt" => {
                let hash = params[0].as_str().unwrap_or_default();
                Ok(self
                    .receipts
                    .lock()
                    .unwrap()
                    .get(hash)
                    .cloned()
                    .unwrap_or(Value::Null))
            }
            "eth_sendTransaction" => {
                if let Some(message) = self.reject_sends.lock().unwrap().clone() {
                    return Err(VaultError::ContractReverted {
                        code: EIP1193_USER_REJECTED,
                        reason: message,
                        data: None,
                    });
                }
                let mut sent = self.sent.lock().unwrap();
                sent.push(params[0].clone());
                Ok(json!(format!("0x{:064x}", sent.len())))
            }
            other => Err(VaultError::RpcUnavailable {
                method: other.to_string(),
                attempts: vec!["mock: unsupported method".into()],
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingSigner
// ---------------------------------------------------------------------------

/// Returns scripted hashes in order and keeps every request it was given.
pub struct RecordingSigner {
    hashes: Mutex<VecDeque<String>>,
    signed: Mutex<Vec<TransactionRequest>>,
    reject: bool,
}

impl RecordingSigner {
    pub fn new(hashes: &[&str]) -> Self {
        Self {
            hashes: Mutex::new(hashes.iter().map(|h| h.to_string()).collect()),
            signed: Mutex::new(Vec::new()),
            reject: false,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::new(&[])
        }
    }

    pub fn signed(&self) -> Vec<TransactionRequest> {
        self.signed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionSigner for RecordingSigner {
    async fn sign(&self, tx: &TransactionRequest) -> Result<String, VaultError> {
        if self.reject {
            return Err(VaultError::SigningRejected {
                reason: "user rejected".into(),
            });
        }
        self.signed.lock().unwrap().push(tx.clone());
        self.hashes
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| VaultError::SigningRejected {
                reason: "no scripted hash left".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// FixedPriceSource
// ---------------------------------------------------------------------------

pub struct FixedPriceSource {
    price: Mutex<BigDecimal>,
    calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl FixedPriceSource {
    pub fn new(price: &str) -> Self {
        Self {
            price: Mutex::new(BigDecimal::from_str(price).unwrap()),
            calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_price(&self, price: &str) {
        *self.price.lock().unwrap() = BigDecimal::from_str(price).unwrap();
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PriceSource for FixedPriceSource {
    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, VaultError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(VaultError::PriceUnavailable {
                reason: format!("{symbol}: scripted failure"),
            });
        }
        Ok(PriceQuote {
            symbol: symbol.to_string(),
            price: self.price.lock().unwrap().clone(),
            as_of: Utc::now(),
        })
    }
}
