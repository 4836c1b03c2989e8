use std::fmt;

use alloy::primitives::Address;
use bigdecimal::BigDecimal;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Serialize, Serializer};

use super::health::{HealthFactor, PositionStatus};

/// Vault position NFT id. `0` means "not yet created" and is what `operate`
/// receives when opening a new position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PositionId(pub BigUint);

impl PositionId {
    pub fn new_position() -> Self {
        Self(BigUint::zero())
    }

    pub fn is_new(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for PositionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<u64> for PositionId {
    fn from(v: u64) -> Self {
        Self(BigUint::from(v))
    }
}

/// Vault risk parameters, in percent. Fetched once per session and swapped
/// wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultConfig {
    pub max_ltv_percent: BigDecimal,
    pub liquidation_threshold_percent: BigDecimal,
    pub liquidation_penalty_percent: BigDecimal,
}

/// Derived risk metrics for a collateral/debt pair at a given price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionMetrics {
    pub collateral_value: BigDecimal,
    pub max_borrowable: BigDecimal,
    pub current_ltv_percent: BigDecimal,
    pub health_factor: HealthFactor,
    pub liquidation_price: BigDecimal,
    pub available_to_borrow: BigDecimal,
    pub status: PositionStatus,
}

/// Position as decoded from the resolver, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPosition {
    pub id: PositionId,
    pub owner: Address,
    pub is_liquidated: bool,
    pub is_supply_position: bool,
    /// Collateral in raw collateral-token units.
    pub supply: BigUint,
    /// Debt in raw debt-token units.
    pub borrow: BigUint,
}

/// A user's vault position with amounts in token units and derived metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BorrowPosition {
    pub id: PositionId,
    pub owner: Address,
    pub collateral_amount: BigDecimal,
    pub debt_amount: BigDecimal,
    pub is_liquidated: bool,
    pub metrics: PositionMetrics,
}
