use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// ABI layout
// ---------------------------------------------------------------------------

/// Width of one ABI word in bytes.
pub const WORD_SIZE: usize = 32;

/// Number of bytes in a function selector.
pub const SELECTOR_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// On-chain scales
// ---------------------------------------------------------------------------

/// RAY: rates returned by the rate resolver carry 27 decimals.
pub const RAY_DECIMALS: u32 = 27;

/// Vault risk parameters are stored as percentages with two decimals
/// (`7500` = 75.00 %).
pub const VAULT_CONFIG_DECIMALS: i64 = 2;

/// Highest token decimal count accepted from configuration.
pub const MAX_TOKEN_DECIMALS: u8 = 36;

// ---------------------------------------------------------------------------
// Default contract signatures
// ---------------------------------------------------------------------------

pub const SIG_BALANCE_OF: &str = "balanceOf(address)";
pub const SIG_ALLOWANCE: &str = "allowance(address,address)";
pub const SIG_APPROVE: &str = "approve(address,uint256)";
pub const SIG_OPERATE: &str = "operate(uint256,int256,int256,address)";
pub const SIG_GET_VAULT_CONFIG: &str = "getVaultConfig(address)";
pub const SIG_GET_POSITIONS_BY_USER: &str = "getPositionsByUser(address,address)";
pub const SIG_GET_RATE: &str = "getRate(address)";

/// ERC-20 / ERC-721 `Transfer` event. Position NFTs index all three fields.
pub const EVENT_TRANSFER: &str = "Transfer(address,address,uint256)";

// ---------------------------------------------------------------------------
// Health factor bands
// ---------------------------------------------------------------------------

/// Minimum health factor a new borrow may leave the position at.
pub const DEFAULT_MIN_HEALTH_FACTOR: Decimal = dec!(1.5);

/// HF strictly above this is `Safe`.
pub const DEFAULT_HF_SAFE_ABOVE: Decimal = dec!(2.0);

/// HF at or above this (and not safe) is `Caution`.
pub const DEFAULT_HF_CAUTION_FROM: Decimal = dec!(1.5);

/// HF strictly above this (and below caution) is `Warning`.
pub const DEFAULT_HF_WARNING_ABOVE: Decimal = dec!(1.2);

/// HF at or below this is eligible for liquidation.
pub const DEFAULT_HF_LIQUIDATION_AT: Decimal = dec!(1.0);

/// Extra debt-token allowance requested when closing, covering interest that
/// accrues between the read and the close transaction (basis points).
pub const DEFAULT_REPAY_BUFFER_BPS: u32 = 10;

// ---------------------------------------------------------------------------
// Timing defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_RPC_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECONDS: u64 = 180;
pub const DEFAULT_RECEIPT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_PRICE_TTL_SECONDS: u64 = 30;

// ---------------------------------------------------------------------------
// JSON-RPC
// ---------------------------------------------------------------------------

/// EIP-1193 "user rejected request".
pub const EIP1193_USER_REJECTED: i64 = 4001;

/// Block tag used for every read.
pub const BLOCK_TAG_LATEST: &str = "latest";
