use alloy::primitives::Address;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::Zero;
use serde::Serialize;

use super::amount::{is_positive, min_int256};
use super::position::PositionId;
use super::token::TokenInfo;
use crate::errors::ValidationError;

/// One attempt to open a position: deposit collateral and borrow against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowRequest {
    pub collateral_amount: BigDecimal,
    pub borrow_amount: BigDecimal,
    pub borrower: Address,
    pub vault: Address,
}

impl BorrowRequest {
    pub fn new(
        collateral_amount: BigDecimal,
        borrow_amount: BigDecimal,
        borrower: Address,
        vault: Address,
    ) -> Result<Self, ValidationError> {
        if !is_positive(&collateral_amount) {
            return Err(ValidationError::NonPositiveAmount {
                field: "collateral amount",
            });
        }
        if !is_positive(&borrow_amount) {
            return Err(ValidationError::NonPositiveAmount {
                field: "borrow amount",
            });
        }
        Ok(Self {
            collateral_amount,
            borrow_amount,
            borrower,
            vault,
        })
    }
}

/// Change to an existing position, in token units.
///
/// Positive collateral deposits and negative withdraws. Positive debt
/// borrows more and negative repays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustRequest {
    pub position_id: PositionId,
    pub collateral_delta: BigDecimal,
    pub debt_delta: BigDecimal,
    pub borrower: Address,
    pub vault: Address,
}

impl AdjustRequest {
    pub fn new(
        position_id: PositionId,
        collateral_delta: BigDecimal,
        debt_delta: BigDecimal,
        borrower: Address,
        vault: Address,
    ) -> Result<Self, ValidationError> {
        if collateral_delta.is_zero() && debt_delta.is_zero() {
            return Err(ValidationError::NoChange);
        }
        Ok(Self {
            position_id,
            collateral_delta,
            debt_delta,
            borrower,
            vault,
        })
    }
}

/// Signed `operate` argument in raw token units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    Exact(BigInt),
    /// Withdraw or repay everything; encoded as `int256::MIN`.
    Max,
}

impl Delta {
    pub fn zero() -> Self {
        Self::Exact(BigInt::zero())
    }

    pub fn to_int256(&self) -> BigInt {
        match self {
            Self::Exact(v) => v.clone(),
            Self::Max => min_int256(),
        }
    }
}

/// Arguments of `operate(nftId, newCol, newDebt, to)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperateCall {
    pub vault: Address,
    pub nft_id: PositionId,
    pub collateral_delta: Delta,
    pub debt_delta: Delta,
    pub to: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Open,
    Adjust,
    Close,
}

/// Allowance the vault needs before `operate` can pull tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequirement {
    pub token: TokenInfo,
    pub spender: Address,
    pub amount: BigDecimal,
}

/// Everything the orchestrator needs for one validated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPlan {
    pub kind: OperationKind,
    pub borrower: Address,
    pub approvals: Vec<ApprovalRequirement>,
    pub call: OperateCall,
}
