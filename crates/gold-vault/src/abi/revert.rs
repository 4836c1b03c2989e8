use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::constants::WORD_SIZE;

/// `Error(string)` selector: `keccak256("Error(string)")[0..4]`.
pub const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// `Panic(uint256)` selector: `keccak256("Panic(uint256)")[0..4]`.
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Human-readable reason from revert data.
///
/// Handles `Error(string)` and `Panic(uint256)`; anything else (custom
/// errors included) comes back as hex.
pub fn decode_revert_reason(data: &[u8]) -> String {
    if data.is_empty() {
        return "Unknown revert".into();
    }

    if data.len() < 4 {
        return format!("0x{}", hex::encode(data));
    }

    if data[..4] == ERROR_SELECTOR {
        if let Some(text) = error_string(&data[4..]) {
            return text;
        }
    }

    if data[..4] == PANIC_SELECTOR && data.len() >= 36 {
        let code = BigUint::from_bytes_be(&data[4..36]);
        return match code.to_u64() {
            Some(0x01) => "Panic: assertion failed".into(),
            Some(0x11) => "Panic: arithmetic overflow/underflow".into(),
            Some(0x12) => "Panic: division by zero".into(),
            Some(0x21) => "Panic: enum conversion out of range".into(),
            Some(0x22) => "Panic: incorrectly encoded storage byte array".into(),
            Some(0x31) => "Panic: pop on empty array".into(),
            Some(0x32) => "Panic: array index out of bounds".into(),
            Some(0x41) => "Panic: too much memory allocated".into(),
            Some(0x51) => "Panic: called zero-initialized function pointer".into(),
            _ => format!("Panic(0x{})", code.to_str_radix(16)),
        };
    }

    format!("0x{}", hex::encode(data))
}

/// ABI-encoded `string` argument: offset word, then length word and bytes
/// at that offset.
fn error_string(args: &[u8]) -> Option<String> {
    let offset = word_as_usize(args, 0)?;
    let len = word_as_usize(args, offset)?;
    let start = offset.checked_add(WORD_SIZE)?;
    let text = args.get(start..start.checked_add(len)?)?;
    Some(String::from_utf8_lossy(text).into_owned())
}

fn word_as_usize(args: &[u8], at: usize) -> Option<usize> {
    let word = args.get(at..at.checked_add(WORD_SIZE)?)?;
    BigUint::from_bytes_be(word).to_usize()
}
