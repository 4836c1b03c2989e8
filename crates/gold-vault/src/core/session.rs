//! Per-session context: chain, contracts, token pair, transport and the
//! cached vault configuration.

use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use alloy::primitives::Address;
use tracing::{info, warn};

use crate::abi::ContractSelectors;
use crate::config::{ChainConfig, TokenConfig, VaultAppConfig};
use crate::errors::VaultError;
use crate::execution::{BorrowRates, PositionResolver, RateResolver, TokenReader};
use crate::rpc::{eth, FallbackTransport, RpcClient};
use crate::types::{TokenInfo, TokenPair, VaultConfig};

/// Resolved addresses and identities. Built once from configuration.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub chain_id: u64,
    pub vault: Address,
    pub vault_resolver: Address,
    pub rate_resolver: Option<Address>,
    pub tokens: TokenPair,
    pub selectors: Arc<ContractSelectors>,
}

fn parse_address(label: &str, raw: &str) -> Result<Address, VaultError> {
    Address::from_str(raw).map_err(|e| VaultError::Config(format!("{label} {raw:?}: {e}")))
}

fn token_info(label: &str, token: &TokenConfig) -> Result<TokenInfo, VaultError> {
    Ok(TokenInfo {
        symbol: token.symbol.clone(),
        address: parse_address(label, &token.address)?,
        decimals: token.decimals,
    })
}

impl SessionContext {
    pub fn from_config(chain: &ChainConfig) -> Result<Self, VaultError> {
        let rate_resolver = match chain.contracts.rate_resolver.as_str() {
            "" => None,
            raw => Some(parse_address("rate_resolver", raw)?),
        };
        Ok(Self {
            chain_id: chain.chain_id,
            vault: parse_address("vault", &chain.contracts.vault)?,
            vault_resolver: parse_address("vault_resolver", &chain.contracts.vault_resolver)?,
            rate_resolver,
            tokens: TokenPair {
                collateral: token_info("collateral_token", &chain.collateral_token)?,
                debt: token_info("debt_token", &chain.debt_token)?,
            },
            selectors: Arc::new(ContractSelectors::from_config(&chain.abi)),
        })
    }
}

/// Shared read side of the engine.
///
/// The vault configuration is fetched lazily and replaced wholesale by
/// [`VaultSession::refresh_vault_config`]; callers hold the `Arc` they got.
pub struct VaultSession {
    context: SessionContext,
    rpc: Arc<dyn RpcClient>,
    tokens: Arc<TokenReader>,
    positions: PositionResolver,
    rates: Option<RateResolver>,
    vault_config: RwLock<Option<Arc<VaultConfig>>>,
}

impl VaultSession {
    pub fn new(context: SessionContext, rpc: Arc<dyn RpcClient>) -> Self {
        let tokens = Arc::new(TokenReader::new(
            rpc.clone(),
            context.selectors.clone(),
            context.chain_id,
        ));
        let positions =
            PositionResolver::new(rpc.clone(), context.selectors.clone(), context.vault_resolver);
        let rates = context
            .rate_resolver
            .map(|addr| RateResolver::new(rpc.clone(), context.selectors.clone(), addr));

        Self {
            context,
            rpc,
            tokens,
            positions,
            rates,
            vault_config: RwLock::new(None),
        }
    }

    /// Session over the configured primary/fallback endpoints.
    pub fn connect(config: &VaultAppConfig) -> Result<Self, VaultError> {
        let context = SessionContext::from_config(&config.chain)?;
        let transport = FallbackTransport::from_urls(
            &config.chain.rpc.http_url,
            &config.chain.rpc.http_url_fallback,
            Duration::from_secs(config.timing.rpc_timeout_seconds),
        )?;
        info!(
            chain_id = context.chain_id,
            vault = %context.vault,
            collateral = %context.tokens.collateral.symbol,
            debt = %context.tokens.debt.symbol,
            "vault session created"
        );
        Ok(Self::new(context, Arc::new(transport)))
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn rpc(&self) -> Arc<dyn RpcClient> {
        self.rpc.clone()
    }

    pub fn token_reader(&self) -> Arc<TokenReader> {
        self.tokens.clone()
    }

    pub fn position_resolver(&self) -> &PositionResolver {
        &self.positions
    }

    /// `eth_chainId` must match the configured chain.
    pub async fn verify_chain(&self) -> Result<u64, VaultError> {
        let actual = eth::chain_id(self.rpc.as_ref()).await?;
        if actual != self.context.chain_id {
            return Err(VaultError::Config(format!(
                "connected to chain {actual}, configured for {}",
                self.context.chain_id
            )));
        }
        info!(chain_id = actual, "chain verified");
        Ok(actual)
    }

    /// Cached vault configuration, fetched on first use.
    pub async fn vault_config(&self) -> Result<Arc<VaultConfig>, VaultError> {
        if let Some(cfg) = self.cached_vault_config() {
            return Ok(cfg);
        }
        self.refresh_vault_config().await
    }

    pub fn cached_vault_config(&self) -> Option<Arc<VaultConfig>> {
        self.vault_config.read().ok()?.clone()
    }

    /// Fetch and swap in a new snapshot.
    pub async fn refresh_vault_config(&self) -> Result<Arc<VaultConfig>, VaultError> {
        let fresh = Arc::new(self.positions.get_vault_config(self.context.vault).await?);
        match self.vault_config.write() {
            Ok(mut slot) => *slot = Some(fresh.clone()),
            Err(_) => warn!("vault config lock poisoned, snapshot not cached"),
        }
        Ok(fresh)
    }

    /// Current supply/borrow APR, when a rate resolver is configured.
    pub async fn rates(&self) -> Result<BorrowRates, VaultError> {
        let resolver = self
            .rates
            .as_ref()
            .ok_or_else(|| VaultError::Config("rate resolver not configured".into()))?;
        resolver.get_rates(self.context.vault).await
    }
}
