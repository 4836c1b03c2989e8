//! Approve → operate state machine.
//!
//! One run per `OperationPlan`: check each required allowance, approve where
//! short, submit `operate`, wait for the receipt and, for a new position,
//! pull the minted NFT id out of the `Transfer` log. Every step is terminal
//! on failure; nothing is retried across states.
//!
//! Cancellation is honoured up to the moment a transaction is handed to the
//! signer. Once a hash exists the run always resolves to `Success` or
//! `Failed`.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, B256};
use num_bigint::BigUint;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::confirmation::{wait_for_receipt, ConfirmationPolicy};
use super::signer::TransactionSigner;
use super::token_reader::{ApprovalAmount, TokenReader};
use crate::abi::{encode_call, AbiValue, ContractSelectors};
use crate::errors::{VaultError, VaultErrorKind};
use crate::rpc::RpcClient;
use crate::types::{
    ApprovalRequirement, OperateCall, OperationKind, OperationPlan, PositionId,
    TransactionReceipt, TransactionRequest,
};

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Observable progress of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    CheckingApproval,
    /// Approving `symbol` for the vault; repeats when both tokens need it.
    Approving { symbol: String },
    SubmittingOperation,
    AwaitingConfirmation { tx_hash: String },
    Success(OperationOutcome),
    Failed { kind: VaultErrorKind, error: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Failed { .. })
    }

    /// Legal edges of the state machine. Any live state may fail.
    pub fn can_transition_to(&self, next: &RunState) -> bool {
        use RunState::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed { .. }) => true,
            (Idle, CheckingApproval) => true,
            (CheckingApproval, CheckingApproval | Approving { .. } | SubmittingOperation) => true,
            (Approving { .. }, CheckingApproval | SubmittingOperation) => true,
            (SubmittingOperation, AwaitingConfirmation { .. }) => true,
            (AwaitingConfirmation { .. }, Success(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub kind: OperationKind,
    pub position_id: PositionId,
    pub tx_hash: String,
}

/// Tracks the current state and mirrors it to the optional watch channel.
struct Run<'a> {
    borrower: Address,
    state: RunState,
    progress: Option<&'a watch::Sender<RunState>>,
}

impl<'a> Run<'a> {
    fn new(borrower: Address, progress: Option<&'a watch::Sender<RunState>>) -> Self {
        Self {
            borrower,
            state: RunState::Idle,
            progress,
        }
    }

    /// Illegal edges are a bug in the driver: they panic in debug builds and
    /// are dropped, never published, in release.
    fn advance(&mut self, next: RunState) {
        if !self.state.can_transition_to(&next) {
            debug_assert!(
                false,
                "illegal run transition {:?} -> {:?}",
                self.state, next
            );
            warn!(borrower = %self.borrower, from = ?self.state, to = ?next, "illegal run transition ignored");
            return;
        }
        debug!(borrower = %self.borrower, state = ?next, "run state");
        if let Some(tx) = self.progress {
            tx.send_replace(next.clone());
        }
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// In-flight guard
// ---------------------------------------------------------------------------

/// Borrowers with a run in progress.
#[derive(Debug, Clone, Default)]
pub struct InFlightRuns {
    active: Arc<Mutex<HashSet<Address>>>,
}

impl InFlightRuns {
    pub fn try_acquire(&self, borrower: Address) -> Result<RunPermit, VaultError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(borrower) {
            return Err(VaultError::OperationInProgress {
                borrower: borrower.to_string(),
            });
        }
        Ok(RunPermit {
            borrower,
            active: self.active.clone(),
        })
    }

    pub fn is_active(&self, borrower: Address) -> bool {
        self.active
            .lock()
            .map(|a| a.contains(&borrower))
            .unwrap_or(false)
    }
}

/// Releases the borrower when dropped.
#[derive(Debug)]
pub struct RunPermit {
    borrower: Address,
    active: Arc<Mutex<HashSet<Address>>>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.borrower);
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct TransactionOrchestrator {
    rpc: Arc<dyn RpcClient>,
    tokens: Arc<TokenReader>,
    signer: Arc<dyn TransactionSigner>,
    selectors: Arc<ContractSelectors>,
    confirmation: ConfirmationPolicy,
    chain_id: u64,
    use_infinite_approval: bool,
    in_flight: InFlightRuns,
}

impl TransactionOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rpc: Arc<dyn RpcClient>,
        tokens: Arc<TokenReader>,
        signer: Arc<dyn TransactionSigner>,
        selectors: Arc<ContractSelectors>,
        confirmation: ConfirmationPolicy,
        chain_id: u64,
        use_infinite_approval: bool,
    ) -> Self {
        Self {
            rpc,
            tokens,
            signer,
            selectors,
            confirmation,
            chain_id,
            use_infinite_approval,
            in_flight: InFlightRuns::default(),
        }
    }

    pub fn in_flight(&self) -> &InFlightRuns {
        &self.in_flight
    }

    /// Drive `plan` to a terminal state. At most one run per borrower.
    pub async fn execute(
        &self,
        plan: &OperationPlan,
        cancel: &CancellationToken,
        progress: Option<&watch::Sender<RunState>>,
    ) -> Result<OperationOutcome, VaultError> {
        let mut run = Run::new(plan.borrower, progress);
        info!(
            borrower = %plan.borrower,
            kind = ?plan.kind,
            position = %plan.call.nft_id,
            approvals = plan.approvals.len(),
            "operation started"
        );

        let result = self.guarded(plan, cancel, &mut run).await;
        match &result {
            Ok(outcome) => {
                info!(
                    borrower = %plan.borrower,
                    position = %outcome.position_id,
                    tx_hash = %outcome.tx_hash,
                    "operation succeeded"
                );
                run.advance(RunState::Success(outcome.clone()));
            }
            Err(e) => {
                warn!(borrower = %plan.borrower, error = %e, "operation failed");
                run.advance(RunState::Failed {
                    kind: e.kind(),
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn guarded(
        &self,
        plan: &OperationPlan,
        cancel: &CancellationToken,
        run: &mut Run<'_>,
    ) -> Result<OperationOutcome, VaultError> {
        let _permit = self.in_flight.try_acquire(plan.borrower)?;

        for approval in &plan.approvals {
            run.advance(RunState::CheckingApproval);
            self.ensure_allowance(plan.borrower, approval, cancel, run)
                .await?;
        }
        if plan.approvals.is_empty() {
            run.advance(RunState::CheckingApproval);
        }

        run.advance(RunState::SubmittingOperation);
        let tx = self.build_operate(plan.borrower, &plan.call)?;
        let tx_hash = self.sign(&tx, cancel).await?;

        run.advance(RunState::AwaitingConfirmation {
            tx_hash: tx_hash.clone(),
        });
        let receipt = wait_for_receipt(self.rpc.as_ref(), &tx_hash, self.confirmation).await?;

        let position_id = if plan.call.nft_id.is_new() {
            extract_position_id(&receipt, plan.borrower, self.selectors.transfer_topic)?
        } else {
            plan.call.nft_id.clone()
        };
        Ok(OperationOutcome {
            kind: plan.kind,
            position_id,
            tx_hash,
        })
    }

    async fn ensure_allowance(
        &self,
        owner: Address,
        approval: &ApprovalRequirement,
        cancel: &CancellationToken,
        run: &mut Run<'_>,
    ) -> Result<(), VaultError> {
        let current = cancellable(
            cancel,
            self.tokens.allowance(&approval.token, owner, approval.spender),
        )
        .await?;
        if current >= approval.amount {
            debug!(
                token = %approval.token.symbol,
                %current,
                required = %approval.amount,
                "allowance sufficient, skipping approval"
            );
            return Ok(());
        }

        run.advance(RunState::Approving {
            symbol: approval.token.symbol.clone(),
        });
        let amount = if self.use_infinite_approval {
            ApprovalAmount::Infinite
        } else {
            ApprovalAmount::Exact(approval.amount.clone())
        };
        let tx = self
            .tokens
            .build_approve(&approval.token, owner, approval.spender, &amount)?;
        let tx_hash = self.sign(&tx, cancel).await?;
        info!(token = %approval.token.symbol, %tx_hash, ?amount, "approval sent");

        wait_for_receipt(self.rpc.as_ref(), &tx_hash, self.confirmation).await?;
        Ok(())
    }

    fn build_operate(&self, from: Address, call: &OperateCall) -> Result<TransactionRequest, VaultError> {
        let data = encode_call(
            self.selectors.operate,
            &[
                AbiValue::Uint(call.nft_id.0.clone()),
                AbiValue::Int(call.collateral_delta.to_int256()),
                AbiValue::Int(call.debt_delta.to_int256()),
                AbiValue::Address(call.to),
            ],
        )?;
        Ok(TransactionRequest::call(from, call.vault, data, self.chain_id))
    }

    /// Last cancellation point. The signer call itself is never interrupted.
    async fn sign(&self, tx: &TransactionRequest, cancel: &CancellationToken) -> Result<String, VaultError> {
        if cancel.is_cancelled() {
            return Err(VaultError::Cancelled);
        }
        self.signer.sign(tx).await
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, VaultError>>,
) -> Result<T, VaultError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(VaultError::Cancelled),
        out = fut => out,
    }
}

/// Id of the position NFT minted to `borrower` in this receipt.
///
/// Matches an ERC-721 `Transfer` (three indexed topics plus the signature)
/// whose recipient is the borrower. ERC-20 transfers carry one fewer topic
/// and never match.
pub fn extract_position_id(
    receipt: &TransactionReceipt,
    borrower: Address,
    transfer_topic: B256,
) -> Result<PositionId, VaultError> {
    let recipient = borrower.into_word();
    receipt
        .logs
        .iter()
        .find(|log| log.topics.len() == 4 && log.topics[0] == transfer_topic && log.topics[2] == recipient)
        .map(|log| PositionId(BigUint::from_bytes_be(log.topics[3].as_slice())))
        .ok_or_else(|| {
            VaultError::decoding(format!(
                "no position Transfer to {borrower} in {}",
                receipt.tx_hash
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        paxg, transfer_log, uint_word, usdc, receipt, MockRpc, RecordingSigner,
    };
    use crate::types::{Delta, LogEntry};
    use bigdecimal::BigDecimal;
    use num_bigint::BigInt;
    use std::time::Duration;

    const VAULT: Address = Address::repeat_byte(0x0f);
    const BORROWER: Address = Address::repeat_byte(0xb0);

    fn policy() -> ConfirmationPolicy {
        ConfirmationPolicy {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
        }
    }

    fn orchestrator(rpc: Arc<MockRpc>, signer: Arc<RecordingSigner>) -> TransactionOrchestrator {
        let selectors = Arc::new(ContractSelectors::default());
        let tokens = Arc::new(TokenReader::new(rpc.clone(), selectors.clone(), 1));
        TransactionOrchestrator::new(rpc, tokens, signer, selectors, policy(), 1, false)
    }

    fn open_plan() -> OperationPlan {
        OperationPlan {
            kind: OperationKind::Open,
            borrower: BORROWER,
            approvals: vec![ApprovalRequirement {
                token: paxg(),
                spender: VAULT,
                amount: BigDecimal::from(1),
            }],
            call: OperateCall {
                vault: VAULT,
                nft_id: PositionId::new_position(),
                collateral_delta: Delta::Exact(BigInt::from(10u64).pow(18)),
                debt_delta: Delta::Exact(BigInt::from(100_000_000u64)),
                to: BORROWER,
            },
        }
    }

    fn set_allowance(rpc: &MockRpc, raw: u128) {
        let selectors = ContractSelectors::default();
        rpc.on_call(paxg().address, selectors.allowance, uint_word(&BigUint::from(raw)));
    }

    fn mint_receipt(hash: &str, id: u64) -> serde_json::Value {
        receipt(hash, true, vec![transfer_log(VAULT, Address::ZERO, BORROWER, id)])
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_skips_approval_when_allowance_sufficient() {
        let rpc = Arc::new(MockRpc::new(1));
        set_allowance(&rpc, 10u128.pow(18));
        rpc.set_receipt(mint_receipt("0x01", 8123));
        let signer = Arc::new(RecordingSigner::new(&["0x01"]));

        let (tx, rx) = watch::channel(RunState::Idle);
        let outcome = orchestrator(rpc, signer.clone())
            .execute(&open_plan(), &CancellationToken::new(), Some(&tx))
            .await
            .unwrap();

        assert_eq!(outcome.position_id, PositionId::from(8123));
        assert_eq!(outcome.kind, OperationKind::Open);
        let signed = signer.signed();
        assert_eq!(signed.len(), 1);
        assert_eq!(signed[0].to, VAULT);
        assert!(matches!(*rx.borrow(), RunState::Success(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_approves_when_allowance_short() {
        let rpc = Arc::new(MockRpc::new(1));
        set_allowance(&rpc, 0);
        rpc.set_receipt(receipt("0x0a", true, vec![]));
        rpc.set_receipt(mint_receipt("0x0b", 77));
        let signer = Arc::new(RecordingSigner::new(&["0x0a", "0x0b"]));

        let outcome = orchestrator(rpc, signer.clone())
            .execute(&open_plan(), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(outcome.position_id, PositionId::from(77));
        let signed = signer.signed();
        assert_eq!(signed.len(), 2);
        assert_eq!(signed[0].to, paxg().address);
        assert_eq!(&signed[0].data[..4], &ContractSelectors::default().approve.0);
        // exact approval of 1 PAXG
        assert_eq!(
            BigUint::from_bytes_be(&signed[0].data[36..68]),
            BigUint::from(10u64).pow(18)
        );
        assert_eq!(&signed[1].data[..4], &ContractSelectors::default().operate.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_broadcast() {
        let rpc = Arc::new(MockRpc::new(1));
        set_allowance(&rpc, 0);
        let signer = Arc::new(RecordingSigner::new(&["0x01"]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orchestrator(rpc, signer.clone())
            .execute(&open_plan(), &cancel, None)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Cancelled));
        assert!(signer.signed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signing_rejected_fails_run() {
        let rpc = Arc::new(MockRpc::new(1));
        set_allowance(&rpc, 10u128.pow(18));
        let signer = Arc::new(RecordingSigner::rejecting());

        let (tx, rx) = watch::channel(RunState::Idle);
        let err = orchestrator(rpc, signer)
            .execute(&open_plan(), &CancellationToken::new(), Some(&tx))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::SigningRejected { .. }));
        assert!(matches!(
            *rx.borrow(),
            RunState::Failed {
                kind: VaultErrorKind::SigningRejected,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverted_operate_is_tx_reverted() {
        let rpc = Arc::new(MockRpc::new(1));
        set_allowance(&rpc, 10u128.pow(18));
        rpc.set_receipt(receipt("0x01", false, vec![]));
        let signer = Arc::new(RecordingSigner::new(&["0x01"]));

        let err = orchestrator(rpc, signer)
            .execute(&open_plan(), &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::TxReverted { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_for_same_borrower_rejected() {
        let rpc = Arc::new(MockRpc::new(1));
        let signer = Arc::new(RecordingSigner::new(&[]));
        let orch = orchestrator(rpc, signer);

        let _held = orch.in_flight().try_acquire(BORROWER).unwrap();
        let err = orch
            .execute(&open_plan(), &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::OperationInProgress { .. }));
    }

    #[test]
    fn test_permit_released_on_drop() {
        let runs = InFlightRuns::default();
        {
            let _p = runs.try_acquire(BORROWER).unwrap();
            assert!(runs.is_active(BORROWER));
            assert!(runs.try_acquire(BORROWER).is_err());
        }
        assert!(!runs.is_active(BORROWER));
        assert!(runs.try_acquire(BORROWER).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_keeps_position_id() {
        let rpc = Arc::new(MockRpc::new(1));
        rpc.set_receipt(receipt("0x05", true, vec![]));
        let signer = Arc::new(RecordingSigner::new(&["0x05"]));
        let plan = OperationPlan {
            kind: OperationKind::Close,
            borrower: BORROWER,
            approvals: vec![],
            call: OperateCall {
                vault: VAULT,
                nft_id: PositionId::from(42),
                collateral_delta: Delta::Max,
                debt_delta: Delta::Max,
                to: BORROWER,
            },
        };

        let outcome = orchestrator(rpc, signer.clone())
            .execute(&plan, &CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(outcome.position_id, PositionId::from(42));

        // int256::MIN is 0x80 followed by zeros
        let data = &signer.signed()[0].data;
        assert_eq!(data[36], 0x80);
        assert!(data[37..68].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_extract_ignores_erc20_transfer_and_other_recipients() {
        let topic = ContractSelectors::default().transfer_topic;
        let erc20 = LogEntry {
            address: usdc().address,
            topics: vec![topic, Address::ZERO.into_word(), BORROWER.into_word()],
            data: uint_word(&BigUint::from(5u8)),
        };
        let mut r =
            TransactionReceipt::from_json(&transfer_log_receipt(Address::repeat_byte(0xee))).unwrap();
        r.logs.insert(0, erc20);
        assert!(extract_position_id(&r, BORROWER, topic).is_err());

        let mine = TransactionReceipt::from_json(&transfer_log_receipt(BORROWER)).unwrap();
        assert_eq!(
            extract_position_id(&mine, BORROWER, topic).unwrap(),
            PositionId::from(9)
        );
    }

    fn transfer_log_receipt(to: Address) -> serde_json::Value {
        receipt("0x09", true, vec![transfer_log(VAULT, Address::ZERO, to, 9)])
    }

    #[test]
    fn test_transitions() {
        assert!(RunState::Idle.can_transition_to(&RunState::CheckingApproval));
        assert!(RunState::CheckingApproval.can_transition_to(&RunState::SubmittingOperation));
        assert!(!RunState::Idle.can_transition_to(&RunState::SubmittingOperation));
        let failed = RunState::Failed {
            kind: VaultErrorKind::TxReverted,
            error: "x".into(),
        };
        assert!(RunState::SubmittingOperation.can_transition_to(&failed));
        assert!(!failed.can_transition_to(&RunState::Idle));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "illegal run transition")]
    fn test_illegal_transition_panics_in_debug() {
        let mut run = Run::new(BORROWER, None);
        run.advance(RunState::SubmittingOperation);
    }

    #[test]
    fn test_failed_state_carries_error_kind() {
        let (tx, rx) = watch::channel(RunState::Idle);
        let mut run = Run::new(BORROWER, Some(&tx));
        run.advance(RunState::CheckingApproval);
        run.advance(RunState::SubmittingOperation);
        run.advance(RunState::AwaitingConfirmation {
            tx_hash: "0x01".into(),
        });
        let err = VaultError::ConfirmationTimeout {
            tx_hash: "0x01".into(),
            timeout_seconds: 10,
        };
        run.advance(RunState::Failed {
            kind: err.kind(),
            error: err.to_string(),
        });
        assert!(matches!(
            *rx.borrow(),
            RunState::Failed {
                kind: VaultErrorKind::ConfirmationTimeout,
                ..
            }
        ));
        assert_eq!(
            serde_json::to_value(&*rx.borrow()).unwrap()["kind"],
            serde_json::json!("confirmation_timeout")
        );
    }
}
