pub mod confirmation;
pub mod orchestrator;
pub mod position_resolver;
pub mod rate_resolver;
pub mod signer;
pub mod token_reader;

pub use confirmation::ConfirmationPolicy;
pub use orchestrator::{InFlightRuns, OperationOutcome, RunState, TransactionOrchestrator};
pub use position_resolver::PositionResolver;
pub use rate_resolver::{BorrowRates, RateResolver};
pub use signer::{NodeSigner, TransactionSigner};
pub use token_reader::{ApprovalAmount, TokenReader};
