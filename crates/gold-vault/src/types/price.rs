use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Collateral price expressed in debt-token units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: BigDecimal,
    pub as_of: DateTime<Utc>,
}
