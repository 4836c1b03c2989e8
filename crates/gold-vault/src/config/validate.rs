use anyhow::{bail, Result};
use rust_decimal_macros::dec;

use super::types::{TokenConfig, VaultAppConfig};
use crate::constants::MAX_TOKEN_DECIMALS;

/// Validate invariants across the merged config that serde alone cannot
/// enforce. All violations are collected and reported together.
pub fn validate_config(config: &VaultAppConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    validate_chain_config(config, &mut errors);
    validate_risk_config(config, &mut errors);
    validate_timing_config(config, &mut errors);
    validate_price_config(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        let msg = format!(
            "Configuration validation failed ({} error{}):\n  - {}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" },
            errors.join("\n  - ")
        );
        bail!("{msg}");
    }
}

// ---------------------------------------------------------------------------
// Chain config
// ---------------------------------------------------------------------------

fn validate_chain_config(config: &VaultAppConfig, errors: &mut Vec<String>) {
    let chain = &config.chain;

    if chain.chain_id == 0 {
        errors.push("chain: chain_id must be non-zero".into());
    }

    if chain.rpc.http_url.is_empty() {
        errors.push("chain.rpc: http_url is empty (set ETH_RPC_URL_HTTP)".into());
    }

    if !chain.rpc.http_url_fallback.is_empty() && chain.rpc.http_url_fallback == chain.rpc.http_url {
        errors.push("chain.rpc: http_url_fallback must differ from http_url".into());
    }

    let required = [
        ("vault", &chain.contracts.vault),
        ("vault_resolver", &chain.contracts.vault_resolver),
    ];
    for (name, addr) in &required {
        if let Err(e) = validate_address(addr) {
            errors.push(format!("chain.contracts.{name}: {e}"));
        }
    }

    // rate_resolver can be empty, but if set must be valid.
    if !chain.contracts.rate_resolver.is_empty() {
        if let Err(e) = validate_address(&chain.contracts.rate_resolver) {
            errors.push(format!("chain.contracts.rate_resolver: {e}"));
        }
    }

    validate_token("collateral_token", &chain.collateral_token, errors);
    validate_token("debt_token", &chain.debt_token, errors);

    if chain
        .collateral_token
        .address
        .eq_ignore_ascii_case(&chain.debt_token.address)
    {
        errors.push("chain: collateral_token and debt_token must be different tokens".into());
    }

    let abi = &chain.abi;
    for (name, sig) in [
        ("balance_of", &abi.balance_of),
        ("allowance", &abi.allowance),
        ("approve", &abi.approve),
        ("operate", &abi.operate),
        ("get_vault_config", &abi.get_vault_config),
        ("get_positions_by_user", &abi.get_positions_by_user),
        ("get_rate", &abi.get_rate),
        ("transfer_event", &abi.transfer_event),
    ] {
        if let Err(e) = validate_signature(sig) {
            errors.push(format!("chain.abi.{name}: {e}"));
        }
    }
}

fn validate_token(name: &str, token: &TokenConfig, errors: &mut Vec<String>) {
    if token.symbol.is_empty() {
        errors.push(format!("chain.{name}: symbol is empty"));
    }
    if let Err(e) = validate_address(&token.address) {
        errors.push(format!("chain.{name}.address: {e}"));
    }
    if token.decimals > MAX_TOKEN_DECIMALS {
        errors.push(format!(
            "chain.{name}: decimals ({}) must be <= {MAX_TOKEN_DECIMALS}",
            token.decimals
        ));
    }
}

// ---------------------------------------------------------------------------
// Risk config
// ---------------------------------------------------------------------------

fn validate_risk_config(config: &VaultAppConfig, errors: &mut Vec<String>) {
    let risk = &config.risk;
    let t = &risk.status_thresholds;

    if risk.min_health_factor <= dec!(1) {
        errors.push(format!(
            "risk: min_health_factor ({}) must be > 1.0",
            risk.min_health_factor
        ));
    }

    // liquidation_at < warning_above < caution_from <= safe_above
    if t.liquidation_at >= t.warning_above {
        errors.push(format!(
            "risk.status_thresholds: liquidation_at ({}) must be < warning_above ({})",
            t.liquidation_at, t.warning_above
        ));
    }
    if t.warning_above >= t.caution_from {
        errors.push(format!(
            "risk.status_thresholds: warning_above ({}) must be < caution_from ({})",
            t.warning_above, t.caution_from
        ));
    }
    if t.caution_from > t.safe_above {
        errors.push(format!(
            "risk.status_thresholds: caution_from ({}) must be <= safe_above ({})",
            t.caution_from, t.safe_above
        ));
    }
    if t.liquidation_at <= dec!(0) {
        errors.push(format!(
            "risk.status_thresholds: liquidation_at ({}) must be > 0",
            t.liquidation_at
        ));
    }

    if risk.repay_buffer_bps > 10_000 {
        errors.push(format!(
            "risk: repay_buffer_bps ({}) must be <= 10000",
            risk.repay_buffer_bps
        ));
    }
}

// ---------------------------------------------------------------------------
// Timing config
// ---------------------------------------------------------------------------

fn validate_timing_config(config: &VaultAppConfig, errors: &mut Vec<String>) {
    let timing = &config.timing;

    if timing.rpc_timeout_seconds == 0 {
        errors.push("timing: rpc_timeout_seconds must be > 0".into());
    }
    if timing.confirmation_timeout_seconds == 0 {
        errors.push("timing: confirmation_timeout_seconds must be > 0".into());
    }
    if timing.receipt_poll_interval_ms == 0 {
        errors.push("timing: receipt_poll_interval_ms must be > 0".into());
    }
    if timing.receipt_poll_interval_ms >= timing.confirmation_timeout_seconds.saturating_mul(1_000) {
        errors.push(format!(
            "timing: receipt_poll_interval_ms ({}) should be shorter than confirmation_timeout_seconds ({})",
            timing.receipt_poll_interval_ms, timing.confirmation_timeout_seconds
        ));
    }
}

// ---------------------------------------------------------------------------
// Price config
// ---------------------------------------------------------------------------

fn validate_price_config(config: &VaultAppConfig, errors: &mut Vec<String>) {
    if config.price.url.is_empty() {
        errors.push("price: url is empty".into());
    }
    if config.price.symbol.is_empty() {
        errors.push("price: symbol is empty".into());
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Validate an Ethereum-style address string: must be 0x-prefixed and 42 chars
/// of hex.
pub(crate) fn validate_address(addr: &str) -> Result<(), String> {
    if addr.is_empty() {
        return Err("address is empty".into());
    }
    if !addr.starts_with("0x") && !addr.starts_with("0X") {
        return Err(format!("address '{addr}' must start with 0x"));
    }
    if addr.len() != 42 {
        return Err(format!(
            "address '{addr}' has length {} (expected 42)",
            addr.len()
        ));
    }
    if !addr[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("address '{addr}' contains non-hex characters"));
    }
    Ok(())
}

/// `name(type,type)` with no whitespace.
fn validate_signature(sig: &str) -> Result<(), String> {
    let Some(open) = sig.find('(') else {
        return Err(format!("signature '{sig}' is missing '('"));
    };
    if open == 0 {
        return Err(format!("signature '{sig}' has no name"));
    }
    if !sig.ends_with(')') {
        return Err(format!("signature '{sig}' must end with ')'"));
    }
    if sig.chars().any(char::is_whitespace) {
        return Err(format!("signature '{sig}' must not contain whitespace"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address_valid() {
        assert!(validate_address("0x45804880De22913dAFE09f4980848ECE6EcbAf78").is_ok());
        assert!(validate_address("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").is_ok());
    }

    #[test]
    fn test_validate_address_empty() {
        assert!(validate_address("").is_err());
    }

    #[test]
    fn test_validate_address_no_prefix() {
        let err = validate_address("45804880De22913dAFE09f4980848ECE6EcbAf78").unwrap_err();
        assert!(err.contains("must start with 0x"));
    }

    #[test]
    fn test_validate_address_wrong_length() {
        let err = validate_address("0x45804880De22913dAFE09f4980848E").unwrap_err();
        assert!(err.contains("length"));
    }

    #[test]
    fn test_validate_address_non_hex() {
        let err = validate_address("0xZZ804880De22913dAFE09f4980848ECE6EcbAf78").unwrap_err();
        assert!(err.contains("non-hex"));
    }

    #[test]
    fn test_validate_signature() {
        assert!(validate_signature("operate(uint256,int256,int256,address)").is_ok());
        assert!(validate_signature("operate").is_err());
        assert!(validate_signature("(address)").is_err());
        assert!(validate_signature("approve(address, uint256)").is_err());
    }
}
