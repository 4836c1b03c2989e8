pub mod types;
pub mod validate;

pub use types::*;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Load and merge all config JSON files into a single [`VaultAppConfig`],
/// then apply environment variable overrides and validate.
///
/// Expected directory layout:
/// ```text
/// config/
///   app.json
///   chain.json
///   risk.json
///   timing.json
///   price.json
/// ```
///
/// # Environment variable overrides
///
/// | Env Var                          | Config Field                           |
/// |----------------------------------|----------------------------------------|
/// | `ETH_RPC_URL_HTTP`               | `chain.rpc.http_url`                   |
/// | `ETH_RPC_URL_HTTP_FALLBACK`      | `chain.rpc.http_url_fallback`          |
/// | `VAULT_ADDRESS`                  | `chain.contracts.vault`                |
/// | `VAULT_RESOLVER_ADDRESS`         | `chain.contracts.vault_resolver`       |
/// | `MIN_HEALTH_FACTOR`              | `risk.min_health_factor`               |
/// | `CONFIRMATION_TIMEOUT_SECONDS`   | `timing.confirmation_timeout_seconds`  |
pub fn load_config(config_dir: &Path) -> Result<VaultAppConfig> {
    let read = |name: &str| -> Result<String> {
        let path = config_dir.join(name);
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))
    };

    let app: AppConfig = serde_json::from_str(&read("app.json")?).context("parsing app.json")?;

    let chain: ChainConfig =
        serde_json::from_str(&read("chain.json")?).context("parsing chain.json")?;

    let risk: RiskConfig = serde_json::from_str(&read("risk.json")?).context("parsing risk.json")?;

    let timing: TimingConfig =
        serde_json::from_str(&read("timing.json")?).context("parsing timing.json")?;

    let price: PriceConfig =
        serde_json::from_str(&read("price.json")?).context("parsing price.json")?;

    let mut config = VaultAppConfig {
        app,
        chain,
        risk,
        timing,
        price,
    };

    apply_env_overrides(&mut config);
    validate::validate_config(&config)?;

    Ok(config)
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Only non-empty env vars take effect. Parse failures are skipped and the
/// JSON value remains.
fn apply_env_overrides(config: &mut VaultAppConfig) {
    // -- RPC URLs ------------------------------------------------------------
    if let Some(val) = env_string("ETH_RPC_URL_HTTP") {
        info!("env override: ETH_RPC_URL_HTTP");
        config.chain.rpc.http_url = val;
    }

    if let Some(val) = env_string("ETH_RPC_URL_HTTP_FALLBACK") {
        info!("env override: ETH_RPC_URL_HTTP_FALLBACK");
        config.chain.rpc.http_url_fallback = val;
    }

    // -- Contracts -----------------------------------------------------------
    if let Some(val) = env_string("VAULT_ADDRESS") {
        info!(vault = %val, "env override: VAULT_ADDRESS");
        config.chain.contracts.vault = val;
    }

    if let Some(val) = env_string("VAULT_RESOLVER_ADDRESS") {
        info!(resolver = %val, "env override: VAULT_RESOLVER_ADDRESS");
        config.chain.contracts.vault_resolver = val;
    }

    // -- Risk / timing -------------------------------------------------------
    if let Some(val) = env_decimal("MIN_HEALTH_FACTOR") {
        info!(%val, "env override: MIN_HEALTH_FACTOR");
        config.risk.min_health_factor = val;
    }

    if let Some(val) = env_parse::<u64>("CONFIRMATION_TIMEOUT_SECONDS") {
        info!(val, "env override: CONFIRMATION_TIMEOUT_SECONDS");
        config.timing.confirmation_timeout_seconds = val;
    }
}

/// Read a non-empty env var as a `String`.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Read a non-empty env var and parse it as `T`.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

/// Read a non-empty env var and parse it as `Decimal`.
fn env_decimal(key: &str) -> Option<Decimal> {
    env_string(key).and_then(|v| Decimal::from_str(&v).ok())
}
