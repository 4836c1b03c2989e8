use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, warn};

use gold_vault::config;
use gold_vault::core::{HttpPriceSource, PriceCache, VaultService, VaultSession};
use gold_vault::execution::NodeSigner;
use gold_vault::logging;

/// Read-only diagnostic: verifies the chain, then prints the vault
/// configuration, rates, price, wallet balances and enriched positions for
/// `USER_WALLET_ADDRESS` as JSON.
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignore if missing).
    let _ = dotenvy::dotenv();

    let config_dir = std::env::var("VAULT_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));

    let config = config::load_config(&config_dir)?;

    // Hold the guard for the process lifetime.
    let _guard = logging::init_tracing(&config.app.logging)?;

    info!(
        chain_id = config.chain.chain_id,
        chain_name = %config.chain.chain_name,
        vault = %config.chain.contracts.vault,
        "gold vault diagnostic starting"
    );

    let wallet = std::env::var("USER_WALLET_ADDRESS")
        .context("USER_WALLET_ADDRESS must be set")?;
    let wallet = Address::from_str(wallet.trim())
        .with_context(|| format!("invalid USER_WALLET_ADDRESS: {wallet}"))?;

    let session = Arc::new(VaultSession::connect(&config).context("failed to build session")?);
    session
        .verify_chain()
        .await
        .context("chain verification failed")?;

    let source = HttpPriceSource::new(
        config.price.url.clone(),
        Duration::from_secs(config.timing.rpc_timeout_seconds),
    )?;
    let price = Arc::new(PriceCache::new(
        Arc::new(source),
        config.price.symbol.clone(),
        Duration::from_secs(config.timing.price_ttl_seconds),
    ));
    let signer = Arc::new(NodeSigner::new(session.rpc()));
    let service = VaultService::new(session.clone(), price, signer, &config.risk, &config.timing);

    let vault_config = session
        .vault_config()
        .await
        .context("failed to read vault config")?;

    let rates = match session.rates().await {
        Ok(r) => Some(r),
        Err(e) => {
            warn!(error = %e, "rates unavailable");
            None
        }
    };

    let quote = service.price().await.context("failed to fetch price")?;
    let balances = service
        .balances(wallet)
        .await
        .context("failed to read wallet balances")?;
    let positions = service
        .positions(wallet)
        .await
        .context("failed to read positions")?;

    info!(%wallet, positions = positions.len(), "diagnostic complete");

    let report = json!({
        "chain_id": session.context().chain_id,
        "vault": session.context().vault.to_string(),
        "wallet": wallet.to_string(),
        "vault_config": vault_config.as_ref(),
        "rates": rates,
        "price": {
            "symbol": quote.symbol,
            "price": quote.price.to_string(),
            "as_of": quote.as_of,
        },
        "balances": balances,
        "positions": positions,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
