//! Risk calculation engine.
//!
//! Pure functions over `BigDecimal`: no I/O and no error paths. Degenerate
//! inputs return sentinels (`0`, `HealthFactor::Infinite`). `RiskPolicy`
//! layers the submission gate on top and is the only place that produces
//! `ValidationError`s.
//!
//! All values are in debt-token terms; the price is collateral priced in the
//! debt token, so debt value equals debt amount.

use bigdecimal::BigDecimal;
use num_traits::{Signed, Zero};

use crate::config::RiskConfig;
use crate::errors::ValidationError;
use crate::types::amount::{decimal_to_big, is_positive};
use crate::types::{
    AdjustRequest, BorrowPosition, BorrowRequest, HealthFactor, PositionMetrics, PositionStatus,
    TokenPair, VaultConfig, WalletBalances,
};

fn hundred() -> BigDecimal {
    BigDecimal::from(100)
}

// ---------------------------------------------------------------------------
// Pure metric functions
// ---------------------------------------------------------------------------

/// `collateral_amount × price`, exact.
pub fn collateral_value(collateral_amount: &BigDecimal, price: &BigDecimal) -> BigDecimal {
    collateral_amount * price
}

/// `collateral_value × max_ltv / 100`.
pub fn max_borrowable(collateral_value: &BigDecimal, max_ltv_percent: &BigDecimal) -> BigDecimal {
    collateral_value * max_ltv_percent / hundred()
}

/// Loan-to-value in percent; `0` without collateral value.
pub fn current_ltv(debt_value: &BigDecimal, collateral_value: &BigDecimal) -> BigDecimal {
    if collateral_value.is_zero() {
        return BigDecimal::zero();
    }
    debt_value / collateral_value * hundred()
}

/// `(collateral_value × threshold / 100) / debt`; infinite without debt.
pub fn health_factor(
    collateral_value: &BigDecimal,
    liquidation_threshold_percent: &BigDecimal,
    debt_value: &BigDecimal,
) -> HealthFactor {
    if !is_positive(debt_value) {
        return HealthFactor::Infinite;
    }
    HealthFactor::Finite(collateral_value * liquidation_threshold_percent / hundred() / debt_value)
}

/// Collateral price at which the position reaches HF = 1; `0` without
/// collateral.
pub fn liquidation_price(
    debt_value: &BigDecimal,
    collateral_amount: &BigDecimal,
    liquidation_threshold_percent: &BigDecimal,
) -> BigDecimal {
    let weighted = collateral_amount * liquidation_threshold_percent / hundred();
    if weighted.is_zero() {
        return BigDecimal::zero();
    }
    debt_value / weighted
}

/// Remaining borrow capacity, floored at zero.
pub fn available_to_borrow(max_borrowable: &BigDecimal, debt_value: &BigDecimal) -> BigDecimal {
    let room = max_borrowable - debt_value;
    if room.is_negative() {
        BigDecimal::zero()
    } else {
        room
    }
}

// ---------------------------------------------------------------------------
// Status bands
// ---------------------------------------------------------------------------

/// Health factor band edges as `BigDecimal`.
#[derive(Debug, Clone)]
pub struct StatusBands {
    pub safe_above: BigDecimal,
    pub caution_from: BigDecimal,
    pub warning_above: BigDecimal,
    pub liquidation_at: BigDecimal,
}

impl StatusBands {
    pub fn from_config(risk: &RiskConfig) -> Self {
        let t = &risk.status_thresholds;
        Self {
            safe_above: decimal_to_big(t.safe_above),
            caution_from: decimal_to_big(t.caution_from),
            warning_above: decimal_to_big(t.warning_above),
            liquidation_at: decimal_to_big(t.liquidation_at),
        }
    }
}

impl Default for StatusBands {
    fn default() -> Self {
        Self::from_config(&RiskConfig::default())
    }
}

/// Map a health factor onto its band.
pub fn classify(hf: &HealthFactor, bands: &StatusBands) -> PositionStatus {
    let Some(v) = hf.finite() else {
        return PositionStatus::Safe;
    };
    if v > &bands.safe_above {
        PositionStatus::Safe
    } else if v >= &bands.caution_from {
        PositionStatus::Caution
    } else if v > &bands.warning_above {
        PositionStatus::Warning
    } else if v > &bands.liquidation_at {
        PositionStatus::Danger
    } else {
        PositionStatus::Liquidatable
    }
}

/// Full metric set for a collateral/debt pair at `price`.
pub fn compute_metrics(
    collateral_amount: &BigDecimal,
    debt_amount: &BigDecimal,
    price: &BigDecimal,
    config: &VaultConfig,
    bands: &StatusBands,
) -> PositionMetrics {
    let value = collateral_value(collateral_amount, price);
    let max = max_borrowable(&value, &config.max_ltv_percent);
    let hf = health_factor(&value, &config.liquidation_threshold_percent, debt_amount);
    let status = classify(&hf, bands);

    PositionMetrics {
        current_ltv_percent: current_ltv(debt_amount, &value),
        liquidation_price: liquidation_price(
            debt_amount,
            collateral_amount,
            &config.liquidation_threshold_percent,
        ),
        available_to_borrow: available_to_borrow(&max, debt_amount),
        collateral_value: value,
        max_borrowable: max,
        health_factor: hf,
        status,
    }
}

// ---------------------------------------------------------------------------
// Submission gate
// ---------------------------------------------------------------------------

/// Gate applied before any transaction is built.
#[derive(Debug, Clone)]
pub struct RiskPolicy {
    pub min_health_factor: BigDecimal,
    pub bands: StatusBands,
}

impl RiskPolicy {
    pub fn from_config(risk: &RiskConfig) -> Self {
        Self {
            min_health_factor: decimal_to_big(risk.min_health_factor),
            bands: StatusBands::from_config(risk),
        }
    }

    pub fn metrics(
        &self,
        collateral_amount: &BigDecimal,
        debt_amount: &BigDecimal,
        price: &BigDecimal,
        config: &VaultConfig,
    ) -> PositionMetrics {
        compute_metrics(collateral_amount, debt_amount, price, config, &self.bands)
    }

    /// Checks, in order: collateral balance, resulting health factor, max
    /// borrowable. Returns the metrics of the position the borrow would open.
    pub fn validate_new_borrow(
        &self,
        request: &BorrowRequest,
        collateral_balance: &BigDecimal,
        pair: &TokenPair,
        price: &BigDecimal,
        config: &VaultConfig,
    ) -> Result<PositionMetrics, ValidationError> {
        if &request.collateral_amount > collateral_balance {
            return Err(ValidationError::InsufficientBalance {
                token: pair.collateral.symbol.clone(),
                required: request.collateral_amount.clone(),
                available: collateral_balance.clone(),
            });
        }

        let metrics = self.metrics(
            &request.collateral_amount,
            &request.borrow_amount,
            price,
            config,
        );
        self.check_resulting(&request.borrow_amount, &metrics)?;
        Ok(metrics)
    }

    /// Validate a change to an existing position.
    ///
    /// Bounds are always checked (deposit against wallet, withdraw against
    /// deposited, repay against debt and wallet). The health factor and max
    /// borrowable gate only applies when the change adds risk, i.e. it
    /// borrows more or withdraws collateral; a pure deposit or repay is
    /// always allowed through.
    pub fn validate_adjustment(
        &self,
        position: &BorrowPosition,
        request: &AdjustRequest,
        balances: &WalletBalances,
        pair: &TokenPair,
        price: &BigDecimal,
        config: &VaultConfig,
    ) -> Result<PositionMetrics, ValidationError> {
        let col = &request.collateral_delta;
        let debt = &request.debt_delta;

        if is_positive(col) && col > &balances.collateral {
            return Err(ValidationError::InsufficientBalance {
                token: pair.collateral.symbol.clone(),
                required: col.clone(),
                available: balances.collateral.clone(),
            });
        }
        if col.is_negative() && col.abs() > position.collateral_amount {
            return Err(ValidationError::ExceedsCollateral {
                requested: col.abs(),
                deposited: position.collateral_amount.clone(),
            });
        }
        if debt.is_negative() {
            let repay = debt.abs();
            if repay > position.debt_amount {
                return Err(ValidationError::ExceedsDebt {
                    requested: repay,
                    outstanding: position.debt_amount.clone(),
                });
            }
            if repay > balances.debt {
                return Err(ValidationError::InsufficientBalance {
                    token: pair.debt.symbol.clone(),
                    required: repay,
                    available: balances.debt.clone(),
                });
            }
        }

        let new_collateral = &position.collateral_amount + col;
        let new_debt = &position.debt_amount + debt;
        let metrics = self.metrics(&new_collateral, &new_debt, price, config);

        if is_positive(debt) || col.is_negative() {
            self.check_resulting(&new_debt, &metrics)?;
        }
        Ok(metrics)
    }

    /// Closing repays everything, so the wallet must cover the debt.
    pub fn validate_close(
        &self,
        position: &BorrowPosition,
        debt_balance: &BigDecimal,
        pair: &TokenPair,
    ) -> Result<(), ValidationError> {
        if &position.debt_amount > debt_balance {
            return Err(ValidationError::InsufficientBalance {
                token: pair.debt.symbol.clone(),
                required: position.debt_amount.clone(),
                available: debt_balance.clone(),
            });
        }
        Ok(())
    }

    fn check_resulting(
        &self,
        debt_amount: &BigDecimal,
        metrics: &PositionMetrics,
    ) -> Result<(), ValidationError> {
        if !is_positive(debt_amount) {
            return Ok(());
        }
        if !metrics.health_factor.at_least(&self.min_health_factor) {
            return Err(ValidationError::HealthFactorTooLow {
                resulting: metrics.health_factor.clone(),
                minimum: self.min_health_factor.clone(),
            });
        }
        if debt_amount > &metrics.max_borrowable {
            return Err(ValidationError::ExceedsMaxBorrow {
                requested: debt_amount.clone(),
                max: metrics.max_borrowable.clone(),
            });
        }
        Ok(())
    }
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self::from_config(&RiskConfig::default())
    }
}
