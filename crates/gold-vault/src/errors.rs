use bigdecimal::BigDecimal;
use serde::Serialize;
use thiserror::Error;

use crate::types::HealthFactor;

/// Which risk rule blocked a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    Amount,
    Balance,
    MaxBorrow,
    HealthFactor,
    Collateral,
    Debt,
}

/// A risk-gate violation, caught before any network write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    NonPositiveAmount { field: &'static str },

    #[error("adjustment changes neither collateral nor debt")]
    NoChange,

    #[error("{field} {amount} has more than {decimals} decimal places")]
    ExceedsTokenPrecision {
        field: &'static str,
        amount: BigDecimal,
        decimals: u8,
    },

    #[error("{token} amount {required} exceeds wallet balance {available}")]
    InsufficientBalance {
        token: String,
        required: BigDecimal,
        available: BigDecimal,
    },

    #[error("borrow {requested} exceeds max borrowable {max}")]
    ExceedsMaxBorrow {
        requested: BigDecimal,
        max: BigDecimal,
    },

    #[error("resulting health factor {resulting} is below minimum {minimum}")]
    HealthFactorTooLow {
        resulting: HealthFactor,
        minimum: BigDecimal,
    },

    #[error("withdraw {requested} exceeds deposited collateral {deposited}")]
    ExceedsCollateral {
        requested: BigDecimal,
        deposited: BigDecimal,
    },

    #[error("repay {requested} exceeds outstanding debt {outstanding}")]
    ExceedsDebt {
        requested: BigDecimal,
        outstanding: BigDecimal,
    },
}

impl ValidationError {
    pub fn rule(&self) -> ValidationRule {
        match self {
            Self::NonPositiveAmount { .. }
            | Self::NoChange
            | Self::ExceedsTokenPrecision { .. } => ValidationRule::Amount,
            Self::InsufficientBalance { .. } => ValidationRule::Balance,
            Self::ExceedsMaxBorrow { .. } => ValidationRule::MaxBorrow,
            Self::HealthFactorTooLow { .. } => ValidationRule::HealthFactor,
            Self::ExceedsCollateral { .. } => ValidationRule::Collateral,
            Self::ExceedsDebt { .. } => ValidationRule::Debt,
        }
    }
}

/// Payload-free classification of a [`VaultError`], for progress
/// subscribers that need to branch on the failure without parsing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultErrorKind {
    RpcUnavailable,
    ContractReverted,
    Validation,
    SigningRejected,
    TxReverted,
    ConfirmationTimeout,
    PositionNotFound,
    OperationInProgress,
    Cancelled,
    Decoding,
    Encoding,
    PriceUnavailable,
    Config,
    Serialization,
}

/// Typed error hierarchy for the vault engine.
///
/// Every variant carries enough structure for the host to render a specific
/// message; application code wraps with `anyhow::Context`.
#[derive(Error, Debug)]
pub enum VaultError {
    // -- Transport ----------------------------------------------------------
    #[error("RPC unavailable for {method}: {}", .attempts.join("; "))]
    RpcUnavailable {
        method: String,
        attempts: Vec<String>,
    },

    #[error("contract reverted: {reason}")]
    ContractReverted {
        code: i64,
        reason: String,
        data: Option<String>,
    },

    // -- Risk gate ----------------------------------------------------------
    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    // -- Signing ------------------------------------------------------------
    #[error("signing rejected: {reason}")]
    SigningRejected { reason: String },

    // -- Execution ----------------------------------------------------------
    #[error("transaction reverted on-chain (tx: {tx_hash})")]
    TxReverted { tx_hash: String },

    #[error("transaction not confirmed after {timeout_seconds}s (tx: {tx_hash})")]
    ConfirmationTimeout {
        tx_hash: String,
        timeout_seconds: u64,
    },

    #[error("position {id} not found for {owner}")]
    PositionNotFound { id: String, owner: String },

    #[error("an operation is already in flight for {borrower}")]
    OperationInProgress { borrower: String },

    #[error("operation cancelled before broadcast")]
    Cancelled,

    // -- Codec --------------------------------------------------------------
    #[error("decoding error: {reason}")]
    DecodingError { reason: String },

    #[error("encoding error: {reason}")]
    EncodingError { reason: String },

    // -- Price --------------------------------------------------------------
    #[error("price unavailable: {reason}")]
    PriceUnavailable { reason: String },

    // -- Configuration ------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),

    // -- Forwarded errors ---------------------------------------------------
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl VaultError {
    pub fn decoding(reason: impl Into<String>) -> Self {
        Self::DecodingError {
            reason: reason.into(),
        }
    }

    pub fn encoding(reason: impl Into<String>) -> Self {
        Self::EncodingError {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> VaultErrorKind {
        match self {
            Self::RpcUnavailable { .. } => VaultErrorKind::RpcUnavailable,
            Self::ContractReverted { .. } => VaultErrorKind::ContractReverted,
            Self::ValidationFailed(_) => VaultErrorKind::Validation,
            Self::SigningRejected { .. } => VaultErrorKind::SigningRejected,
            Self::TxReverted { .. } => VaultErrorKind::TxReverted,
            Self::ConfirmationTimeout { .. } => VaultErrorKind::ConfirmationTimeout,
            Self::PositionNotFound { .. } => VaultErrorKind::PositionNotFound,
            Self::OperationInProgress { .. } => VaultErrorKind::OperationInProgress,
            Self::Cancelled => VaultErrorKind::Cancelled,
            Self::DecodingError { .. } => VaultErrorKind::Decoding,
            Self::EncodingError { .. } => VaultErrorKind::Encoding,
            Self::PriceUnavailable { .. } => VaultErrorKind::PriceUnavailable,
            Self::Config(_) => VaultErrorKind::Config,
            Self::SerdeJson(_) => VaultErrorKind::Serialization,
        }
    }

    /// True when the user backed out; hosts should not present this as a fault.
    pub fn is_user_cancellation(&self) -> bool {
        matches!(self, Self::SigningRejected { .. } | Self::Cancelled)
    }

    /// The violated rule, if this is a risk-gate failure.
    pub fn validation_rule(&self) -> Option<ValidationRule> {
        match self {
            Self::ValidationFailed(v) => Some(v.rule()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_validation_rule_mapping() {
        let err = VaultError::from(ValidationError::ExceedsMaxBorrow {
            requested: BigDecimal::from(400),
            max: BigDecimal::from_str("313.725").unwrap(),
        });
        assert_eq!(err.validation_rule(), Some(ValidationRule::MaxBorrow));
        assert!(err.to_string().contains("313.725"));
    }

    #[test]
    fn test_error_kind() {
        let timeout = VaultError::ConfirmationTimeout {
            tx_hash: "0x01".into(),
            timeout_seconds: 180,
        };
        assert_eq!(timeout.kind(), VaultErrorKind::ConfirmationTimeout);
        assert_eq!(VaultError::Cancelled.kind(), VaultErrorKind::Cancelled);
        assert_eq!(
            VaultError::from(ValidationError::NoChange).kind(),
            VaultErrorKind::Validation
        );
        assert_eq!(
            serde_json::to_value(VaultErrorKind::SigningRejected).unwrap(),
            serde_json::json!("signing_rejected")
        );
    }

    #[test]
    fn test_rpc_unavailable_lists_attempts() {
        let err = VaultError::RpcUnavailable {
            method: "eth_call".into(),
            attempts: vec!["primary: timed out".into(), "fallback: HTTP 502".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("primary: timed out; fallback: HTTP 502"));
    }

    #[test]
    fn test_user_cancellation() {
        assert!(VaultError::Cancelled.is_user_cancellation());
        assert!(VaultError::SigningRejected {
            reason: "user denied".into()
        }
        .is_user_cancellation());
        assert!(!VaultError::decoding("bad").is_user_cancellation());
    }
}
