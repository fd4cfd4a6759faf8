//! Leveraged loop engines: recursive deposit/borrow, and the inverse unwind.
//!
//! The deposit engine re-reads the reserve LTV before every iteration and
//! sizes each borrow with truncating basis-point arithmetic. A mid-loop
//! failure aborts with the chain in whatever state the completed transactions
//! left it; there is no rollback.
//!
//! The withdraw engine's default strategy derives everything from fresh
//! on-chain reads: it never trusts a locally tracked debt figure, sizes each
//! withdrawal to keep the health factor above 1, and shaves a 0.5% margin off
//! to absorb interest accrual between the read and the transaction landing.

use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use agentfi_chain::erc20::TokenOps;
use agentfi_chain::lending::LendingMarket;

use crate::allowance::ensure_allowance;
use crate::error::ToolError;
use crate::math::{self, apply_basis_points, bps_of, BPS_DENOMINATOR};
use crate::position::LoopPosition;

/// Maximum number of loop iterations per deposit.
pub const MAX_LOOPS: u8 = 5;

/// Iteration bound for the health-factor-driven unwind. Interest accrual can
/// in principle outpace margin-reduced repayments; the bound turns that into
/// a typed error instead of an endless transaction stream.
const MAX_UNWIND_ITERATIONS: u32 = 32;

/// Safety margin shaved off each unwind withdrawal, in basis points, against
/// state drift between the read and the transaction landing.
const WITHDRAW_MARGIN_BPS: u16 = 50;

/// Recursive deposit/borrow against a single reserve.
pub struct LoopDepositEngine {
    market: Arc<dyn LendingMarket>,
    tokens: Arc<dyn TokenOps>,
    user: Address,
}

impl LoopDepositEngine {
    pub fn new(market: Arc<dyn LendingMarket>, tokens: Arc<dyn TokenOps>, user: Address) -> Self {
        Self {
            market,
            tokens,
            user,
        }
    }

    /// Deposit `initial_amount`, then `num_loops` times: re-read the reserve
    /// LTV, borrow `current * ltv / 10000`, and deposit the borrow.
    #[instrument(skip(self), fields(user = %self.user, asset = %asset))]
    pub async fn execute(
        &self,
        asset: Address,
        initial_amount: U256,
        num_loops: u8,
    ) -> Result<LoopPosition, ToolError> {
        if initial_amount.is_zero() {
            return Err(ToolError::InvalidParameter {
                field: "initial_amount",
                reason: "must be positive".to_string(),
            });
        }
        if num_loops == 0 || num_loops > MAX_LOOPS {
            return Err(ToolError::InvalidParameter {
                field: "num_loops",
                reason: format!("must be between 1 and {MAX_LOOPS}"),
            });
        }

        let pool = self.market.pool_address();
        ensure_allowance(self.tokens.as_ref(), asset, self.user, pool, initial_amount).await?;
        self.market.deposit(asset, initial_amount, self.user).await?;

        let mut position = LoopPosition::opened_with(initial_amount);
        let mut current = initial_amount;

        for iteration in 1..=num_loops {
            // Fresh LTV read each iteration; governance can change it mid-loop.
            let config = self.market.reserve_config(asset).await?;
            let borrow_amount = bps_of(current, config.ltv_bps);
            if borrow_amount.is_zero() {
                warn!(iteration, "Borrow amount truncated to zero, stopping loop early");
                break;
            }

            self.market.borrow(asset, borrow_amount, self.user).await?;
            ensure_allowance(self.tokens.as_ref(), asset, self.user, pool, borrow_amount).await?;
            self.market.deposit(asset, borrow_amount, self.user).await?;

            position.record_borrow(borrow_amount);
            info!(
                iteration,
                borrowed = %borrow_amount,
                ltv_bps = config.ltv_bps,
                total_borrowed = %position.total_borrowed,
                "Loop iteration complete"
            );
            current = borrow_amount;
        }

        info!(
            iterations = position.borrowed_amounts.len(),
            total_deposited = %position.total_deposited,
            total_borrowed = %position.total_borrowed,
            "Loop deposit complete"
        );
        Ok(position)
    }
}

/// How to unwind a looped position.
#[derive(Debug, Clone)]
pub enum UnwindStrategy {
    /// Derive withdrawal sizes from fresh reads of collateral, debt, and the
    /// liquidation threshold. Needs no recorded position.
    HealthFactorDriven,
    /// Replay a recorded position's borrows in strictly reverse order, then
    /// withdraw its `total_deposited`.
    RecordedAmounts(LoopPosition),
}

/// What an unwind did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnwindReport {
    pub total_repaid: U256,
    pub total_withdrawn: U256,
    pub iterations: u32,
}

/// Inverse of the loop deposit: clear the debt, then the collateral.
pub struct LoopWithdrawEngine {
    market: Arc<dyn LendingMarket>,
    tokens: Arc<dyn TokenOps>,
    user: Address,
}

impl LoopWithdrawEngine {
    pub fn new(market: Arc<dyn LendingMarket>, tokens: Arc<dyn TokenOps>, user: Address) -> Self {
        Self {
            market,
            tokens,
            user,
        }
    }

    #[instrument(skip(self, strategy), fields(user = %self.user, asset = %asset))]
    pub async fn unwind(
        &self,
        asset: Address,
        strategy: UnwindStrategy,
    ) -> Result<UnwindReport, ToolError> {
        match strategy {
            UnwindStrategy::HealthFactorDriven => self.unwind_by_health(asset).await,
            UnwindStrategy::RecordedAmounts(position) => {
                self.unwind_recorded(asset, &position).await
            }
        }
    }

    async fn unwind_by_health(&self, asset: Address) -> Result<UnwindReport, ToolError> {
        let pool = self.market.pool_address();
        let mut report = UnwindReport::default();

        loop {
            // Debt is always re-read, never locally decremented.
            let reserve = self.market.user_reserve(asset, self.user).await?;
            if reserve.variable_debt.is_zero() {
                break;
            }
            if report.iterations >= MAX_UNWIND_ITERATIONS {
                return Err(ToolError::UnwindStalled(report.iterations));
            }

            let config = self.market.reserve_config(asset).await?;
            if config.liquidation_threshold_bps == 0 {
                return Err(
                    anyhow::anyhow!("reserve {asset} has zero liquidation threshold").into(),
                );
            }

            // Collateral required to keep HF >= 1 at the current debt.
            let min_required = (reserve.variable_debt * BPS_DENOMINATOR)
                / U256::from(config.liquidation_threshold_bps);
            let max_withdrawable = reserve.collateral.saturating_sub(min_required);
            if max_withdrawable.is_zero() {
                return Err(ToolError::HealthFactorBreach);
            }

            let withdraw_amount = apply_basis_points(max_withdrawable, WITHDRAW_MARGIN_BPS);
            if withdraw_amount.is_zero() {
                // Dust headroom: the margin rounds every permissible
                // withdrawal to zero, so no progress is possible.
                return Err(ToolError::UnwindStalled(report.iterations));
            }

            self.market.withdraw(asset, withdraw_amount, self.user).await?;
            let repay_amount = math::min(withdraw_amount, reserve.variable_debt);
            ensure_allowance(self.tokens.as_ref(), asset, self.user, pool, repay_amount).await?;
            self.market.repay(asset, repay_amount, self.user).await?;

            report.total_withdrawn += withdraw_amount;
            report.total_repaid += repay_amount;
            report.iterations += 1;
            debug!(
                iteration = report.iterations,
                withdrawn = %withdraw_amount,
                repaid = %repay_amount,
                remaining_debt = %(reserve.variable_debt - repay_amount),
                "Unwind iteration complete"
            );
        }

        // Debt cleared: the full remaining collateral is free.
        let reserve = self.market.user_reserve(asset, self.user).await?;
        if !reserve.collateral.is_zero() {
            self.market
                .withdraw(asset, reserve.collateral, self.user)
                .await?;
            report.total_withdrawn += reserve.collateral;
        }

        info!(
            iterations = report.iterations,
            total_repaid = %report.total_repaid,
            total_withdrawn = %report.total_withdrawn,
            "Unwind complete"
        );
        Ok(report)
    }

    /// Replay the recorded borrows in reverse: withdraw each amount, repay
    /// up to the current debt, and finish by withdrawing `total_deposited`.
    async fn unwind_recorded(
        &self,
        asset: Address,
        position: &LoopPosition,
    ) -> Result<UnwindReport, ToolError> {
        let pool = self.market.pool_address();
        let mut report = UnwindReport::default();

        for amount in position.borrowed_amounts.iter().rev() {
            self.market.withdraw(asset, *amount, self.user).await?;
            report.total_withdrawn += *amount;

            let reserve = self.market.user_reserve(asset, self.user).await?;
            let repay_amount = math::min(*amount, reserve.variable_debt);
            if !repay_amount.is_zero() {
                ensure_allowance(self.tokens.as_ref(), asset, self.user, pool, repay_amount)
                    .await?;
                self.market.repay(asset, repay_amount, self.user).await?;
                report.total_repaid += repay_amount;
            }
            report.iterations += 1;
        }

        if !position.total_deposited.is_zero() {
            self.market
                .withdraw(asset, position.total_deposited, self.user)
                .await?;
            report.total_withdrawn += position.total_deposited;
        }

        info!(
            iterations = report.iterations,
            total_repaid = %report.total_repaid,
            total_withdrawn = %report.total_withdrawn,
            "Recorded-amounts unwind complete"
        );
        Ok(report)
    }
}
