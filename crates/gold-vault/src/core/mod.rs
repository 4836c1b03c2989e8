pub mod price;
pub mod risk;
pub mod session;
pub mod vault_service;

pub use price::{HttpPriceSource, PriceCache, PriceSource};
pub use risk::{RiskPolicy, StatusBands};
pub use session::{SessionContext, VaultSession};
pub use vault_service::{OperationReport, VaultService};
