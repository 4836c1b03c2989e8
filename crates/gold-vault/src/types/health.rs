use std::cmp::Ordering;
use std::fmt;

use bigdecimal::BigDecimal;
use serde::{Serialize, Serializer};

/// Health factor of a borrow position. A position without debt cannot be
/// liquidated and reports `Infinite`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthFactor {
    Finite(BigDecimal),
    Infinite,
}

impl HealthFactor {
    pub fn is_infinite(&self) -> bool {
        matches!(self, Self::Infinite)
    }

    pub fn finite(&self) -> Option<&BigDecimal> {
        match self {
            Self::Finite(v) => Some(v),
            Self::Infinite => None,
        }
    }

    /// `self >= threshold`, with `Infinite` above every threshold.
    pub fn at_least(&self, threshold: &BigDecimal) -> bool {
        match self {
            Self::Finite(v) => v >= threshold,
            Self::Infinite => true,
        }
    }
}

impl Ord for HealthFactor {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Finite(a), Self::Finite(b)) => a.cmp(b),
            (Self::Finite(_), Self::Infinite) => Ordering::Less,
            (Self::Infinite, Self::Finite(_)) => Ordering::Greater,
            (Self::Infinite, Self::Infinite) => Ordering::Equal,
        }
    }
}

impl PartialOrd for HealthFactor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for HealthFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(v) => write!(f, "{}", v.round(4).normalized()),
            Self::Infinite => f.write_str("inf"),
        }
    }
}

impl Serialize for HealthFactor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Finite(v) => serializer.collect_str(v),
            Self::Infinite => serializer.serialize_str("inf"),
        }
    }
}

/// Risk band derived from the health factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    /// HF > 2.0, or no debt.
    Safe,
    /// 1.5 to 2.0.
    Caution,
    /// 1.2 to 1.5.
    Warning,
    /// 1.0 to 1.2.
    Danger,
    /// HF <= 1.0.
    Liquidatable,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Caution => "caution",
            Self::Warning => "warning",
            Self::Danger => "danger",
            Self::Liquidatable => "liquidatable",
        }
    }
}
