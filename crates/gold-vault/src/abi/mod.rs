//! Hand-rolled Solidity ABI codec.
//!
//! Call data is `selector ++ head ++ tail` with 32-byte words. Integers are
//! carried as `num_bigint` values end to end so `2^256 - 1` survives intact.

pub mod decode;
pub mod encode;
pub mod revert;

use std::fmt;

use alloy::primitives::{keccak256, Address, B256};
use num_bigint::{BigInt, BigUint};

use crate::config::AbiConfig;
use crate::constants::SELECTOR_SIZE;
use crate::errors::VaultError;

pub use decode::{decode_result, decode_values};
pub use encode::{encode_call, encode_values};
pub use revert::decode_revert_reason;

/// First four bytes of `keccak256(signature)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector(pub [u8; SELECTOR_SIZE]);

impl Selector {
    pub fn from_signature(signature: &str) -> Self {
        let hash = keccak256(signature.as_bytes());
        let mut out = [0u8; SELECTOR_SIZE];
        out.copy_from_slice(&hash[..SELECTOR_SIZE]);
        Self(out)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector(0x{})", hex::encode(self.0))
    }
}

/// `topic0` of an event.
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// Solidity types the engine reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    Address,
    Bool,
    Uint256,
    Int256,
    Tuple(Vec<AbiType>),
    Array(Box<AbiType>),
}

impl AbiType {
    /// Dynamic types are referenced by offset from the head.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Array(_) => true,
            Self::Tuple(items) => items.iter().any(AbiType::is_dynamic),
            _ => false,
        }
    }

    /// Bytes this type occupies in its enclosing head.
    pub fn head_size(&self) -> usize {
        match self {
            Self::Tuple(items) if !self.is_dynamic() => {
                items.iter().map(AbiType::head_size).sum()
            }
            _ => crate::constants::WORD_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Bool(bool),
    Uint(BigUint),
    Int(BigInt),
    Tuple(Vec<AbiValue>),
    Array(Vec<AbiValue>),
}

impl AbiValue {
    pub fn as_uint(&self) -> Result<&BigUint, VaultError> {
        match self {
            Self::Uint(v) => Ok(v),
            other => Err(mismatch("uint256", other)),
        }
    }

    pub fn as_int(&self) -> Result<&BigInt, VaultError> {
        match self {
            Self::Int(v) => Ok(v),
            other => Err(mismatch("int256", other)),
        }
    }

    pub fn as_address(&self) -> Result<Address, VaultError> {
        match self {
            Self::Address(a) => Ok(*a),
            other => Err(mismatch("address", other)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, VaultError> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }

    pub fn as_tuple(&self) -> Result<&[AbiValue], VaultError> {
        match self {
            Self::Tuple(items) => Ok(items),
            other => Err(mismatch("tuple", other)),
        }
    }

    pub fn as_array(&self) -> Result<&[AbiValue], VaultError> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(mismatch("array", other)),
        }
    }
}

fn mismatch(expected: &str, got: &AbiValue) -> VaultError {
    VaultError::decoding(format!("expected {expected}, got {got:?}"))
}

/// Selectors for every contract function the engine calls, derived from the
/// configured signature strings.
#[derive(Debug, Clone)]
pub struct ContractSelectors {
    pub balance_of: Selector,
    pub allowance: Selector,
    pub approve: Selector,
    pub operate: Selector,
    pub get_vault_config: Selector,
    pub get_positions_by_user: Selector,
    pub get_rate: Selector,
    pub transfer_topic: B256,
}

impl ContractSelectors {
    pub fn from_config(abi: &AbiConfig) -> Self {
        Self {
            balance_of: Selector::from_signature(&abi.balance_of),
            allowance: Selector::from_signature(&abi.allowance),
            approve: Selector::from_signature(&abi.approve),
            operate: Selector::from_signature(&abi.operate),
            get_vault_config: Selector::from_signature(&abi.get_vault_config),
            get_positions_by_user: Selector::from_signature(&abi.get_positions_by_user),
            get_rate: Selector::from_signature(&abi.get_rate),
            transfer_topic: event_topic(&abi.transfer_event),
        }
    }
}

impl Default for ContractSelectors {
    fn default() -> Self {
        Self::from_config(&AbiConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Hex helpers
// ---------------------------------------------------------------------------

/// `0x`-prefixed lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode hex call/return data. The `0x` prefix is optional; odd length or
/// non-hex characters fail with `DecodingError`.
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, VaultError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(digits).map_err(|e| VaultError::decoding(format!("invalid hex data: {e}")))
}

/// Decode a JSON-RPC quantity (`"0x1a"`).
pub fn parse_hex_quantity(s: &str) -> Result<BigUint, VaultError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| VaultError::decoding(format!("quantity {s:?} missing 0x prefix")))?;
    if digits.is_empty() {
        return Ok(BigUint::default());
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| VaultError::decoding(format!("invalid hex quantity {s:?}")))
}
