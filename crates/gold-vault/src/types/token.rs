use alloy::primitives::Address;
use bigdecimal::BigDecimal;
use serde::Serialize;

/// ERC-20 token identity as configured for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

/// The configured collateral/debt pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub collateral: TokenInfo,
    pub debt: TokenInfo,
}

/// Borrower wallet balances of both tokens, in token units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletBalances {
    pub collateral: BigDecimal,
    pub debt: BigDecimal,
}
