//! Engine facade.
//!
//! Every write follows the same path: read balances, price and the vault
//! configuration, run the risk gate, turn the request into an
//! `OperationPlan`, hand it to the orchestrator, then re-query positions.
//! Nothing reaches the signer unless the gate passed.

use std::sync::Arc;

use alloy::primitives::Address;
use bigdecimal::BigDecimal;
use num_traits::{Signed, Zero};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::price::PriceCache;
use super::risk::RiskPolicy;
use super::session::VaultSession;
use crate::config::{RiskConfig, TimingConfig};
use crate::errors::{ValidationError, VaultError};
use crate::execution::{
    ConfirmationPolicy, OperationOutcome, RunState, TransactionOrchestrator, TransactionSigner,
};
use crate::types::amount::{fits_precision, is_positive, to_base_units, to_signed_base_units};
use crate::types::{
    AdjustRequest, ApprovalRequirement, BorrowPosition, BorrowRequest, Delta, OperateCall,
    OperationKind, OperationPlan, PositionId, PositionMetrics, PriceQuote, TokenInfo,
    WalletBalances,
};

/// Result of a completed write plus the positions read back afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub outcome: OperationOutcome,
    /// `None` when the post-operation read failed; the write itself stands.
    pub positions: Option<Vec<BorrowPosition>>,
}

pub struct VaultService {
    session: Arc<VaultSession>,
    price: Arc<PriceCache>,
    policy: RiskPolicy,
    orchestrator: TransactionOrchestrator,
    repay_buffer_bps: u32,
}

impl VaultService {
    pub fn new(
        session: Arc<VaultSession>,
        price: Arc<PriceCache>,
        signer: Arc<dyn TransactionSigner>,
        risk: &RiskConfig,
        timing: &TimingConfig,
    ) -> Self {
        let ctx = session.context();
        let orchestrator = TransactionOrchestrator::new(
            session.rpc(),
            session.token_reader(),
            signer,
            ctx.selectors.clone(),
            ConfirmationPolicy::from_config(timing),
            ctx.chain_id,
            risk.use_infinite_approval,
        );
        Self {
            policy: RiskPolicy::from_config(risk),
            repay_buffer_bps: risk.repay_buffer_bps,
            session,
            price,
            orchestrator,
        }
    }

    pub fn session(&self) -> &VaultSession {
        &self.session
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    // -- Reads --------------------------------------------------------------

    pub async fn price(&self) -> Result<Arc<PriceQuote>, VaultError> {
        self.price.current().await
    }

    pub async fn balances(&self, owner: Address) -> Result<WalletBalances, VaultError> {
        let reader = self.session.token_reader();
        let pair = &self.session.context().tokens;
        let (collateral, debt) = tokio::try_join!(
            reader.balance_of(&pair.collateral, owner),
            reader.balance_of(&pair.debt, owner),
        )?;
        Ok(WalletBalances { collateral, debt })
    }

    /// The owner's positions in this vault, with metrics at the current price.
    pub async fn positions(&self, owner: Address) -> Result<Vec<BorrowPosition>, VaultError> {
        let ctx = self.session.context();
        let (config, quote) = tokio::try_join!(self.session.vault_config(), self.price.current())?;
        self.session
            .position_resolver()
            .get_positions_by_user(ctx.vault, owner, &ctx.tokens, &config, &quote.price, &self.policy)
            .await
    }

    pub async fn position(&self, owner: Address, id: &PositionId) -> Result<BorrowPosition, VaultError> {
        self.positions(owner)
            .await?
            .into_iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| VaultError::PositionNotFound {
                id: id.to_string(),
                owner: owner.to_string(),
            })
    }

    /// Metrics a deposit/borrow pair would produce, from the cached vault
    /// configuration and price.
    pub async fn preview_borrow(
        &self,
        collateral_amount: &BigDecimal,
        borrow_amount: &BigDecimal,
    ) -> Result<PositionMetrics, VaultError> {
        let (config, quote) = tokio::try_join!(self.session.vault_config(), self.price.current())?;
        Ok(self
            .policy
            .metrics(collateral_amount, borrow_amount, &quote.price, &config))
    }

    // -- Plans --------------------------------------------------------------

    pub async fn plan_open(&self, request: &BorrowRequest) -> Result<OperationPlan, VaultError> {
        self.check_vault(request.vault)?;
        let ctx = self.session.context();
        let pair = &ctx.tokens;
        check_precision("collateral amount", &request.collateral_amount, &pair.collateral)?;
        check_precision("borrow amount", &request.borrow_amount, &pair.debt)?;
        let reader = self.session.token_reader();

        let (balance, config, quote) = tokio::try_join!(
            reader.balance_of(&pair.collateral, request.borrower),
            self.session.vault_config(),
            self.price.current(),
        )?;
        let metrics =
            self.policy
                .validate_new_borrow(request, &balance, pair, &quote.price, &config)?;
        info!(
            borrower = %request.borrower,
            collateral = %request.collateral_amount,
            borrow = %request.borrow_amount,
            health_factor = %metrics.health_factor,
            "open validated"
        );

        Ok(OperationPlan {
            kind: OperationKind::Open,
            borrower: request.borrower,
            approvals: vec![ApprovalRequirement {
                token: pair.collateral.clone(),
                spender: request.vault,
                amount: request.collateral_amount.clone(),
            }],
            call: OperateCall {
                vault: request.vault,
                nft_id: PositionId::new_position(),
                collateral_delta: Delta::Exact(
                    to_base_units(&request.collateral_amount, pair.collateral.decimals)?.into(),
                ),
                debt_delta: Delta::Exact(
                    to_base_units(&request.borrow_amount, pair.debt.decimals)?.into(),
                ),
                to: request.borrower,
            },
        })
    }

    pub async fn plan_adjust(&self, request: &AdjustRequest) -> Result<OperationPlan, VaultError> {
        self.check_vault(request.vault)?;
        let ctx = self.session.context();
        let pair = &ctx.tokens;
        check_precision("collateral delta", &request.collateral_delta, &pair.collateral)?;
        check_precision("debt delta", &request.debt_delta, &pair.debt)?;

        let (position, balances, config, quote) = tokio::try_join!(
            self.position(request.borrower, &request.position_id),
            self.balances(request.borrower),
            self.session.vault_config(),
            self.price.current(),
        )?;
        let metrics = self.policy.validate_adjustment(
            &position,
            request,
            &balances,
            pair,
            &quote.price,
            &config,
        )?;
        info!(
            borrower = %request.borrower,
            position = %request.position_id,
            collateral_delta = %request.collateral_delta,
            debt_delta = %request.debt_delta,
            health_factor = %metrics.health_factor,
            "adjustment validated"
        );

        let mut approvals = Vec::new();
        if is_positive(&request.collateral_delta) {
            approvals.push(ApprovalRequirement {
                token: pair.collateral.clone(),
                spender: request.vault,
                amount: request.collateral_delta.clone(),
            });
        }
        if request.debt_delta.is_negative() {
            approvals.push(ApprovalRequirement {
                token: pair.debt.clone(),
                spender: request.vault,
                amount: request.debt_delta.abs(),
            });
        }

        Ok(OperationPlan {
            kind: OperationKind::Adjust,
            borrower: request.borrower,
            approvals,
            call: OperateCall {
                vault: request.vault,
                nft_id: request.position_id.clone(),
                collateral_delta: Delta::Exact(to_signed_base_units(
                    &request.collateral_delta,
                    pair.collateral.decimals,
                )?),
                debt_delta: Delta::Exact(to_signed_base_units(
                    &request.debt_delta,
                    pair.debt.decimals,
                )?),
                to: request.borrower,
            },
        })
    }

    /// Full repay and full withdraw via the vault's "max" sentinels.
    pub async fn plan_close(&self, owner: Address, id: &PositionId) -> Result<OperationPlan, VaultError> {
        let ctx = self.session.context();
        let pair = &ctx.tokens;

        let position = self.position(owner, id).await?;
        let debt_balance = self
            .session
            .token_reader()
            .balance_of(&pair.debt, owner)
            .await?;
        self.policy.validate_close(&position, &debt_balance, pair)?;

        let mut approvals = Vec::new();
        if !position.debt_amount.is_zero() {
            approvals.push(ApprovalRequirement {
                token: pair.debt.clone(),
                spender: ctx.vault,
                amount: with_buffer(&position.debt_amount, self.repay_buffer_bps),
            });
        }
        info!(
            %owner,
            position = %id,
            debt = %position.debt_amount,
            collateral = %position.collateral_amount,
            "close validated"
        );

        Ok(OperationPlan {
            kind: OperationKind::Close,
            borrower: owner,
            approvals,
            call: OperateCall {
                vault: ctx.vault,
                nft_id: id.clone(),
                collateral_delta: Delta::Max,
                debt_delta: Delta::Max,
                to: owner,
            },
        })
    }

    // -- Writes -------------------------------------------------------------

    pub async fn open_position(
        &self,
        request: &BorrowRequest,
        cancel: &CancellationToken,
        progress: Option<&watch::Sender<RunState>>,
    ) -> Result<OperationReport, VaultError> {
        let plan = self.plan_open(request).await?;
        self.run(plan, cancel, progress).await
    }

    pub async fn adjust_position(
        &self,
        request: &AdjustRequest,
        cancel: &CancellationToken,
        progress: Option<&watch::Sender<RunState>>,
    ) -> Result<OperationReport, VaultError> {
        let plan = self.plan_adjust(request).await?;
        self.run(plan, cancel, progress).await
    }

    pub async fn close_position(
        &self,
        owner: Address,
        id: &PositionId,
        cancel: &CancellationToken,
        progress: Option<&watch::Sender<RunState>>,
    ) -> Result<OperationReport, VaultError> {
        let plan = self.plan_close(owner, id).await?;
        self.run(plan, cancel, progress).await
    }

    async fn run(
        &self,
        plan: OperationPlan,
        cancel: &CancellationToken,
        progress: Option<&watch::Sender<RunState>>,
    ) -> Result<OperationReport, VaultError> {
        let outcome = self.orchestrator.execute(&plan, cancel, progress).await?;
        let positions = match self.positions(plan.borrower).await {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(borrower = %plan.borrower, error = %e, "position refresh failed");
                None
            }
        };
        Ok(OperationReport { outcome, positions })
    }

    fn check_vault(&self, vault: Address) -> Result<(), VaultError> {
        let bound = self.session.context().vault;
        if vault != bound {
            return Err(VaultError::Config(format!(
                "request targets vault {vault}, session is bound to {bound}"
            )));
        }
        Ok(())
    }
}

/// Reject amounts the token cannot represent, so the encoded delta is
/// exactly what was validated.
fn check_precision(
    field: &'static str,
    amount: &BigDecimal,
    token: &TokenInfo,
) -> Result<(), ValidationError> {
    if fits_precision(amount, token.decimals) {
        Ok(())
    } else {
        Err(ValidationError::ExceedsTokenPrecision {
            field,
            amount: amount.clone(),
            decimals: token.decimals,
        })
    }
}

/// `amount × (1 + bps / 10000)`.
fn with_buffer(amount: &BigDecimal, bps: u32) -> BigDecimal {
    amount * (BigDecimal::from(10_000u32 + bps) / BigDecimal::from(10_000u32))
}
