//! Lending plugin: leveraged loop positions, plain borrow/repay, and the
//! position monitor.
//!
//! Calls touching the same reserve are serialized through a per-asset lock so
//! two concurrent tool calls cannot interleave their read-then-transact
//! sequences against one position.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::info;

use agentfi_chain::erc20::Erc20;
use agentfi_chain::lending::{AaveMarket, LendingMarket};
use agentfi_chain::WalletClient;
use agentfi_core::allowance::ensure_allowance;
use agentfi_core::config::{Deployment, Deployments};
use agentfi_core::error::ToolError;
use agentfi_core::loop_engine::{
    LoopDepositEngine, LoopWithdrawEngine, UnwindStrategy, MAX_LOOPS,
};
use agentfi_core::math::{format_units, parse_base_units};
use agentfi_core::position::{LoopPosition, PositionHealth};
use agentfi_core::tool::{parse_address, parse_params, Plugin, ToolSpec};

use alloy::primitives::Address;

pub struct LendingPlugin {
    wallet: Arc<dyn WalletClient>,
    tokens: Arc<Erc20>,
    deployments: Deployments,
    asset_locks: parking_lot::Mutex<HashMap<Address, Arc<AsyncMutex<()>>>>,
}

#[derive(Deserialize)]
struct LoopDepositParams {
    asset: String,
    initial_amount: String,
    num_loops: u8,
}

#[derive(Deserialize)]
struct LoopWithdrawParams {
    asset: String,
    #[serde(default)]
    position: Option<Value>,
}

#[derive(Deserialize)]
struct BorrowParams {
    collateral_asset: String,
    collateral_amount: String,
    debt_asset: String,
    borrow_amount: String,
}

#[derive(Deserialize)]
struct RepayParams {
    asset: String,
    amount: String,
}

#[derive(Deserialize)]
struct MonitorParams {
    asset: String,
}

impl LendingPlugin {
    pub fn new(wallet: Arc<dyn WalletClient>, deployments: Deployments) -> Self {
        let tokens = Arc::new(Erc20::new(wallet.clone()));
        Self {
            wallet,
            tokens,
            deployments,
            asset_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    fn deployment(&self) -> Result<Deployment, ToolError> {
        let chain_id = self.wallet.chain_id();
        self.deployments
            .get(chain_id)
            .cloned()
            .ok_or(ToolError::UnsupportedChain {
                plugin: "lending".to_string(),
                chain_id,
            })
    }

    fn market(&self, deployment: &Deployment) -> Arc<dyn LendingMarket> {
        Arc::new(
            AaveMarket::new(
                self.wallet.clone(),
                deployment.lending_pool,
                deployment.data_provider,
            )
            .with_referral_code(deployment.referral_code),
        )
    }

    /// Serialize calls touching the same reserve.
    async fn lock_asset(&self, asset: Address) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.asset_locks.lock();
            locks
                .entry(asset)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    async fn loop_deposit(&self, params: LoopDepositParams) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let asset = parse_address("asset", &params.asset)?;
        let initial_amount = parse_base_units("initial_amount", &params.initial_amount)?;

        let _guard = self.lock_asset(asset).await;
        let engine = LoopDepositEngine::new(
            self.market(&deployment),
            self.tokens.clone(),
            self.wallet.address(),
        );
        let position = engine.execute(asset, initial_amount, params.num_loops).await?;
        Ok(position.to_json())
    }

    async fn loop_withdraw(&self, params: LoopWithdrawParams) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let asset = parse_address("asset", &params.asset)?;
        let strategy = match &params.position {
            Some(value) => UnwindStrategy::RecordedAmounts(LoopPosition::from_json(value)?),
            None => UnwindStrategy::HealthFactorDriven,
        };

        let _guard = self.lock_asset(asset).await;
        let engine = LoopWithdrawEngine::new(
            self.market(&deployment),
            self.tokens.clone(),
            self.wallet.address(),
        );
        let report = engine.unwind(asset, strategy).await?;
        Ok(json!({
            "total_repaid": report.total_repaid.to_string(),
            "total_withdrawn": report.total_withdrawn.to_string(),
            "iterations": report.iterations,
        }))
    }

    async fn borrow(&self, params: BorrowParams) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let collateral_asset = parse_address("collateral_asset", &params.collateral_asset)?;
        let collateral_amount =
            parse_base_units("collateral_amount", &params.collateral_amount)?;
        let debt_asset = parse_address("debt_asset", &params.debt_asset)?;
        let borrow_amount = parse_base_units("borrow_amount", &params.borrow_amount)?;
        if collateral_amount.is_zero() || borrow_amount.is_zero() {
            return Err(ToolError::InvalidParameter {
                field: "borrow_amount",
                reason: "amounts must be positive".to_string(),
            });
        }

        let _guard = self.lock_asset(collateral_asset).await;
        let market = self.market(&deployment);
        let user = self.wallet.address();

        ensure_allowance(
            self.tokens.as_ref(),
            collateral_asset,
            user,
            deployment.lending_pool,
            collateral_amount,
        )
        .await?;
        let deposit_tx = market.deposit(collateral_asset, collateral_amount, user).await?;
        let borrow_tx = market.borrow(debt_asset, borrow_amount, user).await?;

        info!(collateral = %collateral_asset, debt = %debt_asset, "Borrow complete");
        Ok(json!({
            "deposit_tx": format!("{deposit_tx:?}"),
            "borrow_tx": format!("{borrow_tx:?}"),
        }))
    }

    async fn repay(&self, params: RepayParams) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let asset = parse_address("asset", &params.asset)?;
        let amount = parse_base_units("amount", &params.amount)?;
        if amount.is_zero() {
            return Err(ToolError::InvalidParameter {
                field: "amount",
                reason: "must be positive".to_string(),
            });
        }

        let _guard = self.lock_asset(asset).await;
        let market = self.market(&deployment);
        let user = self.wallet.address();

        ensure_allowance(
            self.tokens.as_ref(),
            asset,
            user,
            deployment.lending_pool,
            amount,
        )
        .await?;
        let tx = market.repay(asset, amount, user).await?;
        Ok(json!({ "tx": format!("{tx:?}") }))
    }

    async fn monitor_position(&self, params: MonitorParams) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let asset = parse_address("asset", &params.asset)?;
        let market = self.market(&deployment);

        let config = market.reserve_config(asset).await?;
        let reserve = market.user_reserve(asset, self.wallet.address()).await?;
        let health =
            PositionHealth::assess(reserve.collateral, reserve.variable_debt, config.liquidation_threshold_bps);

        let mut out = health.to_json();
        out["collateral_display"] = json!(format_units(reserve.collateral, config.decimals));
        out["debt_display"] = json!(format_units(reserve.variable_debt, config.decimals));
        out["liquidation_threshold_bps"] = json!(config.liquidation_threshold_bps);
        Ok(out)
    }
}

#[async_trait]
impl Plugin for LendingPlugin {
    fn name(&self) -> &str {
        "lending"
    }

    fn supports_chain(&self, chain_id: u64) -> bool {
        self.deployments.supports(chain_id)
    }

    fn tools(&self) -> Vec<ToolSpec> {
        let amount = |desc: &str| json!({ "type": "string", "description": desc });
        vec![
            ToolSpec::new(
                "loop_deposit",
                "Open a leveraged loop position: deposit the initial amount, then repeatedly \
                 borrow at the reserve LTV and re-deposit. Amounts are base units. Returns the \
                 recorded position (per-iteration borrows and totals).",
                json!({
                    "type": "object",
                    "properties": {
                        "asset": { "type": "string", "description": "Reserve token address" },
                        "initial_amount": amount("Initial deposit in base units"),
                        "num_loops": { "type": "integer", "minimum": 1, "maximum": MAX_LOOPS,
                                       "description": "Number of borrow/deposit iterations" },
                    },
                    "required": ["asset", "initial_amount", "num_loops"],
                }),
            ),
            ToolSpec::new(
                "loop_withdraw",
                "Unwind a leveraged loop position: repeatedly withdraw as much collateral as \
                 the health factor allows, repay debt with it, and finish by withdrawing the \
                 remaining collateral. Pass a recorded position to replay its exact borrow \
                 amounts in reverse instead.",
                json!({
                    "type": "object",
                    "properties": {
                        "asset": { "type": "string", "description": "Reserve token address" },
                        "position": { "type": "object",
                                      "description": "Optional recorded position from loop_deposit" },
                    },
                    "required": ["asset"],
                }),
            ),
            ToolSpec::new(
                "borrow",
                "Deposit collateral and borrow a debt asset against it at a variable rate. \
                 Amounts are base units.",
                json!({
                    "type": "object",
                    "properties": {
                        "collateral_asset": { "type": "string" },
                        "collateral_amount": amount("Collateral to deposit, base units"),
                        "debt_asset": { "type": "string" },
                        "borrow_amount": amount("Amount to borrow, base units"),
                    },
                    "required": ["collateral_asset", "collateral_amount", "debt_asset", "borrow_amount"],
                }),
            ),
            ToolSpec::new(
                "repay",
                "Repay variable-rate debt. Amounts are base units.",
                json!({
                    "type": "object",
                    "properties": {
                        "asset": { "type": "string", "description": "Debt token address" },
                        "amount": amount("Amount to repay, base units"),
                    },
                    "required": ["asset", "amount"],
                }),
            ),
            ToolSpec::new(
                "monitor_position",
                "Read the wallet's position in a reserve: collateral, variable debt, current \
                 LTV, and health factor ('infinite' when there is no debt).",
                json!({
                    "type": "object",
                    "properties": {
                        "asset": { "type": "string", "description": "Reserve token address" },
                    },
                    "required": ["asset"],
                }),
            ),
        ]
    }

    async fn execute(&self, tool: &str, params: &Value) -> Result<Value, ToolError> {
        match tool {
            "loop_deposit" => self.loop_deposit(parse_params(params)?).await,
            "loop_withdraw" => self.loop_withdraw(parse_params(params)?).await,
            "borrow" => self.borrow(parse_params(params)?).await,
            "repay" => self.repay(parse_params(params)?).await,
            "monitor_position" => self.monitor_position(parse_params(params)?).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}
