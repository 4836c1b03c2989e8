use num_bigint::{BigInt, BigUint, Sign};
use num_traits::One;

use super::{AbiValue, Selector};
use crate::constants::WORD_SIZE;
use crate::errors::VaultError;

/// `selector ++ encode(values)`.
pub fn encode_call(selector: Selector, values: &[AbiValue]) -> Result<Vec<u8>, VaultError> {
    let body = encode_values(values)?;
    let mut out = Vec::with_capacity(selector.0.len() + body.len());
    out.extend_from_slice(&selector.0);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Encode values as a tuple: static parts inline, dynamic parts appended and
/// referenced by offset.
pub fn encode_values(values: &[AbiValue]) -> Result<Vec<u8>, VaultError> {
    let head_len: usize = values.iter().map(head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for value in values {
        if is_dynamic(value) {
            let offset = BigUint::from(head_len + tail.len());
            head.extend_from_slice(&uint_word(&offset)?);
            tail.extend_from_slice(&encode_value(value)?);
        } else {
            head.extend_from_slice(&encode_value(value)?);
        }
    }

    head.extend_from_slice(&tail);
    Ok(head)
}

fn encode_value(value: &AbiValue) -> Result<Vec<u8>, VaultError> {
    match value {
        AbiValue::Address(addr) => {
            let mut word = [0u8; WORD_SIZE];
            word[WORD_SIZE - 20..].copy_from_slice(addr.as_slice());
            Ok(word.to_vec())
        }
        AbiValue::Bool(b) => uint_word(&BigUint::from(u8::from(*b))).map(|w| w.to_vec()),
        AbiValue::Uint(v) => uint_word(v).map(|w| w.to_vec()),
        AbiValue::Int(v) => int_word(v).map(|w| w.to_vec()),
        AbiValue::Tuple(items) => encode_values(items),
        AbiValue::Array(items) => {
            let mut out = uint_word(&BigUint::from(items.len()))?.to_vec();
            out.extend_from_slice(&encode_values(items)?);
            Ok(out)
        }
    }
}

fn is_dynamic(value: &AbiValue) -> bool {
    match value {
        AbiValue::Array(_) => true,
        AbiValue::Tuple(items) => items.iter().any(is_dynamic),
        _ => false,
    }
}

fn head_size(value: &AbiValue) -> usize {
    match value {
        AbiValue::Tuple(items) if !is_dynamic(value) => items.iter().map(head_size).sum(),
        _ => WORD_SIZE,
    }
}

/// Big-endian, left-padded to 32 bytes.
fn uint_word(v: &BigUint) -> Result<[u8; WORD_SIZE], VaultError> {
    let bytes = v.to_bytes_be();
    if bytes.len() > WORD_SIZE {
        return Err(VaultError::encoding(format!("{v} does not fit in uint256")));
    }
    let mut word = [0u8; WORD_SIZE];
    word[WORD_SIZE - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

/// Two's complement across the full 256 bits.
fn int_word(v: &BigInt) -> Result<[u8; WORD_SIZE], VaultError> {
    let half = BigInt::one() << 255u32;
    if *v >= half || *v < -&half {
        return Err(VaultError::encoding(format!("{v} does not fit in int256")));
    }
    let unsigned = match v.sign() {
        Sign::Minus => (BigInt::one() << 256u32) + v,
        _ => v.clone(),
    };
    let magnitude = unsigned
        .to_biguint()
        .ok_or_else(|| VaultError::encoding(format!("{v} does not fit in int256")))?;
    uint_word(&magnitude)
}
