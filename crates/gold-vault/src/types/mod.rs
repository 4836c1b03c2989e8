pub mod amount;
pub mod health;
pub mod position;
pub mod price;
pub mod request;
pub mod token;
pub mod transaction;

pub use health::{HealthFactor, PositionStatus};
pub use position::{BorrowPosition, PositionId, PositionMetrics, RawPosition, VaultConfig};
pub use price::PriceQuote;
pub use request::{
    AdjustRequest, ApprovalRequirement, BorrowRequest, Delta, OperateCall, OperationKind,
    OperationPlan,
};
pub use token::{TokenInfo, TokenPair, WalletBalances};
pub use transaction::{LogEntry, TransactionReceipt, TransactionRequest};
