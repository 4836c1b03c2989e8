use alloy::primitives::Address;
use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive};

use super::{parse_hex_bytes, AbiType, AbiValue};
use crate::constants::WORD_SIZE;
use crate::errors::VaultError;

/// Decode hex return data into values of the given types.
pub fn decode_result(hex_data: &str, types: &[AbiType]) -> Result<Vec<AbiValue>, VaultError> {
    let data = parse_hex_bytes(hex_data)?;
    decode_values(&data, types)
}

/// Decode raw bytes laid out as a tuple of `types`.
pub fn decode_values(data: &[u8], types: &[AbiType]) -> Result<Vec<AbiValue>, VaultError> {
    if types.is_empty() {
        return Ok(Vec::new());
    }
    decode_tuple(data, 0, types)
}

/// Walk the head of a tuple starting at `base`, following offsets (relative
/// to `base`) into the tail for dynamic members.
fn decode_tuple(data: &[u8], base: usize, types: &[AbiType]) -> Result<Vec<AbiValue>, VaultError> {
    let mut values = Vec::with_capacity(types.len());
    let mut cursor = base;

    for ty in types {
        let value = if ty.is_dynamic() {
            let offset = read_usize(data, cursor)?;
            let target = base
                .checked_add(offset)
                .ok_or_else(|| VaultError::decoding("offset overflow"))?;
            decode_at(data, target, ty)?
        } else {
            decode_at(data, cursor, ty)?
        };
        values.push(value);
        cursor += ty.head_size();
    }

    Ok(values)
}

fn decode_at(data: &[u8], at: usize, ty: &AbiType) -> Result<AbiValue, VaultError> {
    match ty {
        AbiType::Address => {
            let word = read_word(data, at)?;
            if word[..12].iter().any(|b| *b != 0) {
                return Err(VaultError::decoding(format!(
                    "dirty high bytes in address word at {at}"
                )));
            }
            Ok(AbiValue::Address(Address::from_slice(&word[12..])))
        }
        AbiType::Bool => {
            let word = read_word(data, at)?;
            match (word[..31].iter().all(|b| *b == 0), word[31]) {
                (true, 0) => Ok(AbiValue::Bool(false)),
                (true, 1) => Ok(AbiValue::Bool(true)),
                _ => Err(VaultError::decoding(format!("invalid bool word at {at}"))),
            }
        }
        AbiType::Uint256 => Ok(AbiValue::Uint(BigUint::from_bytes_be(read_word(data, at)?))),
        AbiType::Int256 => {
            let word = read_word(data, at)?;
            let unsigned = BigInt::from(BigUint::from_bytes_be(word));
            let value = if word[0] & 0x80 != 0 {
                unsigned - (BigInt::one() << 256u32)
            } else {
                unsigned
            };
            Ok(AbiValue::Int(value))
        }
        AbiType::Tuple(items) => decode_tuple(data, at, items).map(AbiValue::Tuple),
        AbiType::Array(item) => {
            let len = read_usize(data, at)?;
            let start = at + WORD_SIZE;
            let needed = len
                .checked_mul(item.head_size())
                .ok_or_else(|| VaultError::decoding("array length overflow"))?;
            if start.saturating_add(needed) > data.len() {
                return Err(VaultError::decoding(format!(
                    "array of {len} elements at {at} overruns {} bytes of data",
                    data.len()
                )));
            }
            let element_types = vec![(**item).clone(); len];
            decode_tuple(data, start, &element_types).map(AbiValue::Array)
        }
    }
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8], VaultError> {
    at.checked_add(WORD_SIZE)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| {
            VaultError::decoding(format!(
                "word at {at} out of bounds ({} bytes of data)",
                data.len()
            ))
        })
}

/// Offsets and lengths: a uint256 that must fit in memory.
fn read_usize(data: &[u8], at: usize) -> Result<usize, VaultError> {
    let raw = BigUint::from_bytes_be(read_word(data, at)?);
    raw.to_usize()
        .filter(|v| *v <= data.len())
        .ok_or_else(|| VaultError::decoding(format!("offset or length {raw} at {at} out of range")))
}
