//! Conversions between on-chain integer units and off-chain decimals.
//!
//! Token amounts leave the wire as `BigUint` and are immediately lifted into
//! `BigDecimal` using the token's configured decimals. Nothing monetary ever
//! passes through a fixed-width machine integer.

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, ToPrimitive, Zero};
use rust_decimal::Decimal;

use crate::constants::{RAY_DECIMALS, VAULT_CONFIG_DECIMALS};
use crate::errors::VaultError;

/// Largest scale `rust_decimal` can carry.
const MAX_DECIMAL_SCALE: u32 = 28;

/// `2^256 - 1`, the ERC-20 "infinite" allowance.
pub fn max_uint256() -> BigUint {
    (BigUint::one() << 256u32) - BigUint::one()
}

/// Largest positive `int256`.
pub fn max_int256() -> BigInt {
    (BigInt::one() << 255u32) - BigInt::one()
}

/// `type(int256).min`, which the vault reads as "entire balance".
pub fn min_int256() -> BigInt {
    -(BigInt::one() << 255u32)
}

/// Lift a raw token amount into a decimal using the token's decimals.
pub fn from_base_units(raw: &BigUint, decimals: u8) -> BigDecimal {
    BigDecimal::new(BigInt::from(raw.clone()), i64::from(decimals))
}

/// Lower a decimal amount to raw token units.
///
/// Digits beyond the token's precision are truncated. Negative amounts and
/// values above `2^256 - 1` are rejected.
pub fn to_base_units(amount: &BigDecimal, decimals: u8) -> Result<BigUint, VaultError> {
    let (raw, _) = amount
        .with_scale(i64::from(decimals))
        .as_bigint_and_exponent();
    let unsigned = raw
        .to_biguint()
        .ok_or_else(|| VaultError::encoding(format!("negative token amount {amount}")))?;
    if unsigned > max_uint256() {
        return Err(VaultError::encoding(format!(
            "token amount {amount} does not fit in uint256"
        )));
    }
    Ok(unsigned)
}

/// Whether `amount` is representable in a token with `decimals` places.
pub fn fits_precision(amount: &BigDecimal, decimals: u8) -> bool {
    let (_, scale) = amount.normalized().as_bigint_and_exponent();
    scale <= i64::from(decimals)
}

/// Lower a signed decimal delta to raw units, bounded to the exclusive
/// `int256` range (`int256::MIN` is reserved for the "max" sentinel).
pub fn to_signed_base_units(amount: &BigDecimal, decimals: u8) -> Result<BigInt, VaultError> {
    let (raw, _) = amount
        .with_scale(i64::from(decimals))
        .as_bigint_and_exponent();
    let bound = max_int256();
    if raw > bound || raw < -bound {
        return Err(VaultError::encoding(format!(
            "delta {amount} does not fit in int256"
        )));
    }
    Ok(raw)
}

/// Vault percentages are integers with two implied decimals (`8000` = 80 %).
pub fn percent_from_scaled(raw: &BigUint) -> BigDecimal {
    BigDecimal::new(BigInt::from(raw.clone()), VAULT_CONFIG_DECIMALS)
}

/// Convert a RAY-scaled (1e27) rate into an APR percentage.
///
/// The division happens in `BigDecimal`; only the final percentage is
/// narrowed to `Decimal`, which fails when it exceeds `Decimal`'s range.
pub fn ray_to_apr_percent(raw: &BigUint) -> Result<Decimal, VaultError> {
    // rate / 1e27 * 100 == rate / 1e25
    let apr = BigDecimal::new(BigInt::from(raw.clone()), i64::from(RAY_DECIMALS - 2)).normalized();
    let (_, scale) = apr.as_bigint_and_exponent();
    let apr = apr.with_scale(scale.clamp(0, i64::from(MAX_DECIMAL_SCALE)));
    let (mantissa, scale) = apr.as_bigint_and_exponent();
    let out_of_range = || VaultError::decoding(format!("rate {raw} out of range"));
    let mantissa = mantissa.to_i128().ok_or_else(out_of_range)?;
    let scale = u32::try_from(scale).map_err(|_| out_of_range())?;
    Decimal::try_from_i128_with_scale(mantissa, scale)
        .map_err(|e| VaultError::decoding(format!("rate {raw} out of range: {e}")))
}

/// Lift a configured `rust_decimal` value into `BigDecimal` without loss.
pub fn decimal_to_big(d: Decimal) -> BigDecimal {
    BigDecimal::new(BigInt::from(d.mantissa()), i64::from(d.scale()))
}

/// Strictly positive check that reads well at call sites.
pub fn is_positive(amount: &BigDecimal) -> bool {
    amount.sign() == Sign::Plus && !amount.is_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn big(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_from_base_units_scales_by_decimals() {
        let raw = BigUint::from(100_000_000_000_000_000u64);
        assert_eq!(from_base_units(&raw, 18), big("0.1"));
        assert_eq!(from_base_units(&BigUint::from(100_000_000u64), 6), big("100"));
    }

    #[test]
    fn test_to_base_units_truncates_excess_precision() {
        let raw = to_base_units(&big("1.2345678"), 6).unwrap();
        assert_eq!(raw, BigUint::from(1_234_567u64));
    }

    #[test]
    fn test_fits_precision() {
        assert!(fits_precision(&big("0.000001"), 6));
        assert!(fits_precision(&big("100.500000000"), 6));
        assert!(fits_precision(&big("1e21"), 0));
        assert!(!fits_precision(&big("0.0000001"), 6));
        assert!(!fits_precision(&big("0.1000000000000000009"), 18));
    }

    #[test]
    fn test_to_base_units_rejects_negative() {
        assert!(to_base_units(&big("-1"), 6).is_err());
    }

    #[test]
    fn test_max_uint256_survives_decimal_lift() {
        let max = max_uint256();
        let lifted = from_base_units(&max, 18);
        assert_eq!(to_base_units(&lifted, 18).unwrap(), max);

        let too_big = &lifted + big("0.000000000000000001");
        assert!(to_base_units(&too_big, 18).is_err());
    }

    #[test]
    fn test_signed_bounds() {
        assert_eq!(
            to_signed_base_units(&big("-2.5"), 6).unwrap(),
            BigInt::from(-2_500_000)
        );
        let min = BigDecimal::new(min_int256(), 0);
        assert!(to_signed_base_units(&min, 0).is_err());
    }

    #[test]
    fn test_percent_from_scaled() {
        assert_eq!(percent_from_scaled(&BigUint::from(7500u32)), big("75"));
        assert_eq!(percent_from_scaled(&BigUint::from(8050u32)), big("80.5"));
    }

    #[test]
    fn test_ray_to_apr_percent() {
        // 0.05 in RAY
        let raw = BigUint::from(50_000_000_000_000_000_000_000_000u128);
        assert_eq!(ray_to_apr_percent(&raw).unwrap(), dec!(5));
    }

    #[test]
    fn test_ray_to_apr_percent_beyond_i128() {
        // 1e40 RAY is 1e15 %, past i128 as a raw integer but fine as a decimal
        let raw = BigUint::from(10u8).pow(40);
        assert_eq!(
            ray_to_apr_percent(&raw).unwrap(),
            dec!(1000000000000000)
        );
        // past Decimal's 96-bit mantissa
        let raw = BigUint::from(10u8).pow(60);
        assert!(matches!(
            ray_to_apr_percent(&raw),
            Err(VaultError::DecodingError { .. })
        ));
    }

    #[test]
    fn test_ray_to_apr_percent_keeps_fraction() {
        // 3.25e25 RAY -> 3.25 %
        let raw = BigUint::from(325u32) * BigUint::from(10u8).pow(23);
        assert_eq!(ray_to_apr_percent(&raw).unwrap(), dec!(3.25));
    }

    #[test]
    fn test_decimal_to_big() {
        assert_eq!(decimal_to_big(dec!(1.5)), big("1.5"));
        assert_eq!(decimal_to_big(dec!(-0.001)), big("-0.001"));
    }

    #[test]
    fn test_is_positive() {
        assert!(is_positive(&big("0.000001")));
        assert!(!is_positive(&big("0")));
        assert!(!is_positive(&big("-3")));
    }
}
