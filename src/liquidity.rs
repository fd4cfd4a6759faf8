//! Concentrated-liquidity plugin: mint, grow, shrink, collect, and burn
//! positions on Algebra-style pools.
//!
//! Token pairs are ordered by address before any call, matching the pool's
//! token0/token1 ordering; amounts passed by the caller are swapped alongside.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use agentfi_chain::erc20::Erc20;
use agentfi_chain::liquidity::{PositionManager, TickRange};
use agentfi_chain::swap::deadline_from_now;
use agentfi_chain::WalletClient;
use agentfi_core::allowance::ensure_allowance;
use agentfi_core::config::{Deployment, Deployments};
use agentfi_core::error::ToolError;
use agentfi_core::math::parse_base_units;
use agentfi_core::tool::{parse_address, parse_params, Plugin, ToolSpec};

use alloy::primitives::{Address, U256};

const DEFAULT_DEADLINE_SECONDS: u64 = 60;

fn default_deadline() -> u64 {
    DEFAULT_DEADLINE_SECONDS
}

/// Order a pair the way the pool stores it, swapping the amounts to match.
fn order_pair(
    token_a: Address,
    amount_a: U256,
    token_b: Address,
    amount_b: U256,
) -> (Address, U256, Address, U256) {
    if token_a <= token_b {
        (token_a, amount_a, token_b, amount_b)
    } else {
        (token_b, amount_b, token_a, amount_a)
    }
}

pub struct LiquidityPlugin {
    wallet: Arc<dyn WalletClient>,
    tokens: Arc<Erc20>,
    deployments: Deployments,
}

#[derive(Deserialize)]
struct MintPositionParams {
    token_a: String,
    amount_a: String,
    token_b: String,
    amount_b: String,
    #[serde(default = "default_deadline")]
    deadline_seconds: u64,
}

#[derive(Deserialize)]
struct IncreaseParams {
    token_id: String,
    amount_a: String,
    amount_b: String,
    #[serde(default = "default_deadline")]
    deadline_seconds: u64,
}

#[derive(Deserialize)]
struct DecreaseParams {
    token_id: String,
    percentage: u8,
    #[serde(default = "default_deadline")]
    deadline_seconds: u64,
}

#[derive(Deserialize)]
struct TokenIdParams {
    token_id: String,
}

impl LiquidityPlugin {
    pub fn new(wallet: Arc<dyn WalletClient>, deployments: Deployments) -> Self {
        let tokens = Arc::new(Erc20::new(wallet.clone()));
        Self {
            wallet,
            tokens,
            deployments,
        }
    }

    fn deployment(&self) -> Result<Deployment, ToolError> {
        let chain_id = self.wallet.chain_id();
        self.deployments
            .get(chain_id)
            .cloned()
            .ok_or(ToolError::UnsupportedChain {
                plugin: "liquidity".to_string(),
                chain_id,
            })
    }

    fn manager(&self, deployment: &Deployment) -> PositionManager {
        PositionManager::new(
            self.wallet.clone(),
            deployment.position_manager,
            deployment.pool_factory,
        )
    }

    async fn approve_pair(
        &self,
        spender: Address,
        token0: Address,
        amount0: U256,
        token1: Address,
        amount1: U256,
    ) -> Result<(), ToolError> {
        let owner = self.wallet.address();
        ensure_allowance(self.tokens.as_ref(), token0, owner, spender, amount0).await?;
        ensure_allowance(self.tokens.as_ref(), token1, owner, spender, amount1).await?;
        Ok(())
    }

    async fn mint_position(&self, params: MintPositionParams) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let token_a = parse_address("token_a", &params.token_a)?;
        let token_b = parse_address("token_b", &params.token_b)?;
        if token_a == token_b {
            return Err(ToolError::InvalidParameter {
                field: "token_b",
                reason: "pair tokens must differ".to_string(),
            });
        }
        let amount_a = parse_base_units("amount_a", &params.amount_a)?;
        let amount_b = parse_base_units("amount_b", &params.amount_b)?;
        let (token0, amount0, token1, amount1) = order_pair(token_a, amount_a, token_b, amount_b);

        let manager = self.manager(&deployment);
        let pool = manager.pool_for(token0, token1).await?;
        let range = TickRange::around(manager.current_tick(pool).await?);

        self.approve_pair(deployment.position_manager, token0, amount0, token1, amount1)
            .await?;
        let tx = manager
            .mint(
                token0,
                token1,
                range,
                amount0,
                amount1,
                self.wallet.address(),
                deadline_from_now(params.deadline_seconds),
            )
            .await?;

        info!(pool = %pool, lower = range.lower, upper = range.upper, "Position minted");
        Ok(json!({
            "tx": format!("{tx:?}"),
            "tick_lower": range.lower,
            "tick_upper": range.upper,
        }))
    }

    async fn increase_liquidity(&self, params: IncreaseParams) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let token_id = parse_base_units("token_id", &params.token_id)?;
        let amount_a = parse_base_units("amount_a", &params.amount_a)?;
        let amount_b = parse_base_units("amount_b", &params.amount_b)?;

        let manager = self.manager(&deployment);
        let position = manager.position(token_id).await?;
        // The caller's pair may be in either order; align amounts with the
        // position's token0/token1.
        let (_, amount0, _, amount1) =
            order_pair(position.token0, amount_a, position.token1, amount_b);

        self.approve_pair(
            deployment.position_manager,
            position.token0,
            amount0,
            position.token1,
            amount1,
        )
        .await?;
        let tx = manager
            .increase_liquidity(
                token_id,
                amount0,
                amount1,
                deadline_from_now(params.deadline_seconds),
            )
            .await?;
        Ok(json!({ "tx": format!("{tx:?}") }))
    }

    async fn decrease_liquidity(&self, params: DecreaseParams) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let token_id = parse_base_units("token_id", &params.token_id)?;
        if params.percentage == 0 || params.percentage > 100 {
            return Err(ToolError::InvalidParameter {
                field: "percentage",
                reason: "must be between 1 and 100".to_string(),
            });
        }

        let manager = self.manager(&deployment);
        let position = manager.position(token_id).await?;
        let liquidity =
            (position.liquidity * U256::from(params.percentage) / U256::from(100u64)).to::<u128>();
        if liquidity == 0 {
            return Err(ToolError::InvalidParameter {
                field: "percentage",
                reason: "position has no liquidity to remove".to_string(),
            });
        }

        let tx = manager
            .decrease_liquidity(
                token_id,
                liquidity,
                deadline_from_now(params.deadline_seconds),
            )
            .await?;
        Ok(json!({ "tx": format!("{tx:?}"), "liquidity_removed": liquidity.to_string() }))
    }

    async fn collect_fees(&self, params: TokenIdParams) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let token_id = parse_base_units("token_id", &params.token_id)?;
        let tx = self
            .manager(&deployment)
            .collect(token_id, self.wallet.address(), u128::MAX, u128::MAX)
            .await?;
        Ok(json!({ "tx": format!("{tx:?}") }))
    }

    async fn burn_position(&self, params: TokenIdParams) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let token_id = parse_base_units("token_id", &params.token_id)?;
        let tx = self.manager(&deployment).burn(token_id).await?;
        Ok(json!({ "tx": format!("{tx:?}") }))
    }
}

#[async_trait]
impl Plugin for LiquidityPlugin {
    fn name(&self) -> &str {
        "liquidity"
    }

    fn supports_chain(&self, chain_id: u64) -> bool {
        self.deployments.supports(chain_id)
    }

    fn tools(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::new(
                "mint_position",
                "Open a concentrated-liquidity position around the pool's current price. \
                 The range spans five tick spacings on each side of the current tick. \
                 Amounts are base units; token order does not matter.",
                json!({
                    "type": "object",
                    "properties": {
                        "token_a": { "type": "string" },
                        "amount_a": { "type": "string" },
                        "token_b": { "type": "string" },
                        "amount_b": { "type": "string" },
                        "deadline_seconds": { "type": "integer" },
                    },
                    "required": ["token_a", "amount_a", "token_b", "amount_b"],
                }),
            ),
            ToolSpec::new(
                "increase_liquidity",
                "Add liquidity to an existing position. Amounts are base units and are \
                 matched to the position's token order.",
                json!({
                    "type": "object",
                    "properties": {
                        "token_id": { "type": "string", "description": "Position NFT id" },
                        "amount_a": { "type": "string" },
                        "amount_b": { "type": "string" },
                        "deadline_seconds": { "type": "integer" },
                    },
                    "required": ["token_id", "amount_a", "amount_b"],
                }),
            ),
            ToolSpec::new(
                "decrease_liquidity",
                "Remove a percentage (1-100) of a position's liquidity.",
                json!({
                    "type": "object",
                    "properties": {
                        "token_id": { "type": "string", "description": "Position NFT id" },
                        "percentage": { "type": "integer", "minimum": 1, "maximum": 100 },
                        "deadline_seconds": { "type": "integer" },
                    },
                    "required": ["token_id", "percentage"],
                }),
            ),
            ToolSpec::new(
                "collect_fees",
                "Collect all accrued fees from a position to the wallet.",
                json!({
                    "type": "object",
                    "properties": {
                        "token_id": { "type": "string", "description": "Position NFT id" },
                    },
                    "required": ["token_id"],
                }),
            ),
            ToolSpec::new(
                "burn_position",
                "Burn an empty position NFT. Liquidity and fees must be removed first.",
                json!({
                    "type": "object",
                    "properties": {
                        "token_id": { "type": "string", "description": "Position NFT id" },
                    },
                    "required": ["token_id"],
                }),
            ),
        ]
    }

    async fn execute(&self, tool: &str, params: &Value) -> Result<Value, ToolError> {
        match tool {
            "mint_position" => self.mint_position(parse_params(params)?).await,
            "increase_liquidity" => self.increase_liquidity(parse_params(params)?).await,
            "decrease_liquidity" => self.decrease_liquidity(parse_params(params)?).await,
            "collect_fees" => self.collect_fees(parse_params(params)?).await,
            "burn_position" => self.burn_position(parse_params(params)?).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}
