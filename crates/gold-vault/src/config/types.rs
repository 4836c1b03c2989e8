use rust_decimal::Decimal;
use serde::Deserialize;

use crate::constants::{
    DEFAULT_CONFIRMATION_TIMEOUT_SECONDS, DEFAULT_HF_CAUTION_FROM, DEFAULT_HF_LIQUIDATION_AT,
    DEFAULT_HF_SAFE_ABOVE, DEFAULT_HF_WARNING_ABOVE, DEFAULT_MIN_HEALTH_FACTOR,
    DEFAULT_PRICE_TTL_SECONDS, DEFAULT_RECEIPT_POLL_INTERVAL_MS, DEFAULT_REPAY_BUFFER_BPS,
    DEFAULT_RPC_TIMEOUT_SECONDS, EVENT_TRANSFER, SIG_ALLOWANCE, SIG_APPROVE, SIG_BALANCE_OF,
    SIG_GET_POSITIONS_BY_USER, SIG_GET_RATE, SIG_GET_VAULT_CONFIG, SIG_OPERATE,
};

// ---------------------------------------------------------------------------
// Top-level aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct VaultAppConfig {
    pub app: AppConfig,
    pub chain: ChainConfig,
    pub risk: RiskConfig,
    pub timing: TimingConfig,
    pub price: PriceConfig,
}

// ---------------------------------------------------------------------------
// app.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: String,
}

// ---------------------------------------------------------------------------
// chain.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub chain_name: String,
    pub rpc: RpcConfig,
    pub contracts: ContractsConfig,
    pub collateral_token: TokenConfig,
    pub debt_token: TokenConfig,
    #[serde(default)]
    pub abi: AbiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub http_url: String,
    /// Empty disables fallback.
    #[serde(default)]
    pub http_url_fallback: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    pub vault: String,
    pub vault_resolver: String,
    /// Empty when the deployment has no rate resolver.
    #[serde(default)]
    pub rate_resolver: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
}

/// Contract function signatures. Selectors are derived from these at
/// session start, so a redeployed vault with a different surface needs only
/// a config change.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AbiConfig {
    pub balance_of: String,
    pub allowance: String,
    pub approve: String,
    pub operate: String,
    pub get_vault_config: String,
    pub get_positions_by_user: String,
    pub get_rate: String,
    pub transfer_event: String,
}

impl Default for AbiConfig {
    fn default() -> Self {
        Self {
            balance_of: SIG_BALANCE_OF.into(),
            allowance: SIG_ALLOWANCE.into(),
            approve: SIG_APPROVE.into(),
            operate: SIG_OPERATE.into(),
            get_vault_config: SIG_GET_VAULT_CONFIG.into(),
            get_positions_by_user: SIG_GET_POSITIONS_BY_USER.into(),
            get_rate: SIG_GET_RATE.into(),
            transfer_event: EVENT_TRANSFER.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// risk.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    #[serde(with = "rust_decimal::serde::str", default = "default_min_health_factor")]
    pub min_health_factor: Decimal,
    #[serde(default)]
    pub status_thresholds: StatusThresholds,
    /// Approve `2^256 - 1` instead of the exact amount.
    #[serde(default)]
    pub use_infinite_approval: bool,
    #[serde(default = "default_repay_buffer_bps")]
    pub repay_buffer_bps: u32,
}

fn default_min_health_factor() -> Decimal {
    DEFAULT_MIN_HEALTH_FACTOR
}

fn default_repay_buffer_bps() -> u32 {
    DEFAULT_REPAY_BUFFER_BPS
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            min_health_factor: DEFAULT_MIN_HEALTH_FACTOR,
            status_thresholds: StatusThresholds::default(),
            use_infinite_approval: false,
            repay_buffer_bps: DEFAULT_REPAY_BUFFER_BPS,
        }
    }
}

/// Health factor band edges.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusThresholds {
    #[serde(with = "rust_decimal::serde::str")]
    pub safe_above: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub caution_from: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub warning_above: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub liquidation_at: Decimal,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            safe_above: DEFAULT_HF_SAFE_ABOVE,
            caution_from: DEFAULT_HF_CAUTION_FROM,
            warning_above: DEFAULT_HF_WARNING_ABOVE,
            liquidation_at: DEFAULT_HF_LIQUIDATION_AT,
        }
    }
}

// ---------------------------------------------------------------------------
// timing.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_rpc_timeout_seconds")]
    pub rpc_timeout_seconds: u64,
    #[serde(default = "default_confirmation_timeout_seconds")]
    pub confirmation_timeout_seconds: u64,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default = "default_price_ttl_seconds")]
    pub price_ttl_seconds: u64,
}

fn default_rpc_timeout_seconds() -> u64 {
    DEFAULT_RPC_TIMEOUT_SECONDS
}

fn default_confirmation_timeout_seconds() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECONDS
}

fn default_receipt_poll_interval_ms() -> u64 {
    DEFAULT_RECEIPT_POLL_INTERVAL_MS
}

fn default_price_ttl_seconds() -> u64 {
    DEFAULT_PRICE_TTL_SECONDS
}

// ---------------------------------------------------------------------------
// price.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PriceConfig {
    /// Ticker endpoint returning `{"symbol": "...", "price": "..."}`.
    pub url: String,
    pub symbol: String,
}
