//! Swap plugin: single-hop and multi-hop swaps through the Algebra-style
//! router. The input token is approved (exact amount) before every swap.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use agentfi_chain::erc20::Erc20;
use agentfi_chain::swap::{deadline_from_now, encode_path, SwapRouter};
use agentfi_chain::WalletClient;
use agentfi_core::allowance::ensure_allowance;
use agentfi_core::config::{Deployment, Deployments};
use agentfi_core::error::ToolError;
use agentfi_core::math::parse_base_units;
use agentfi_core::tool::{parse_address, parse_params, Plugin, ToolSpec};

use alloy::primitives::aliases::U160;
use alloy::primitives::Address;

const DEFAULT_DEADLINE_SECONDS: u64 = 60;

/// Pool fees are uint24 on-chain.
const MAX_POOL_FEE: u32 = (1 << 24) - 1;

pub struct SwapPlugin {
    wallet: Arc<dyn WalletClient>,
    tokens: Arc<Erc20>,
    deployments: Deployments,
}

fn default_deadline() -> u64 {
    DEFAULT_DEADLINE_SECONDS
}

#[derive(Deserialize)]
struct ExactInputSingleParams {
    token_in: String,
    token_out: String,
    amount_in: String,
    amount_out_minimum: String,
    #[serde(default)]
    limit_sqrt_price: Option<String>,
    #[serde(default = "default_deadline")]
    deadline_seconds: u64,
}

#[derive(Deserialize)]
struct ExactOutputSingleParams {
    token_in: String,
    token_out: String,
    amount_out: String,
    amount_in_maximum: String,
    #[serde(default)]
    limit_sqrt_price: Option<String>,
    #[serde(default = "default_deadline")]
    deadline_seconds: u64,
}

#[derive(Deserialize)]
struct PathParams {
    token_in: String,
    #[serde(default)]
    intermediate_tokens: Vec<String>,
    token_out: String,
    fees: Vec<u32>,
}

#[derive(Deserialize)]
struct ExactInputParams {
    path: PathParams,
    amount_in: String,
    amount_out_minimum: String,
    #[serde(default = "default_deadline")]
    deadline_seconds: u64,
}

#[derive(Deserialize)]
struct ExactOutputParams {
    path: PathParams,
    amount_out: String,
    amount_in_maximum: String,
    #[serde(default = "default_deadline")]
    deadline_seconds: u64,
}

impl PathParams {
    /// Resolve to (tokens, fees) with one fee per hop.
    fn resolve(&self) -> Result<(Vec<Address>, Vec<u32>), ToolError> {
        let mut tokens = Vec::with_capacity(self.intermediate_tokens.len() + 2);
        tokens.push(parse_address("path.token_in", &self.token_in)?);
        for token in &self.intermediate_tokens {
            tokens.push(parse_address("path.intermediate_tokens", token)?);
        }
        tokens.push(parse_address("path.token_out", &self.token_out)?);

        if self.fees.len() != tokens.len() - 1 {
            return Err(ToolError::InvalidParameter {
                field: "path.fees",
                reason: format!(
                    "expected {} fees for {} tokens, got {}",
                    tokens.len() - 1,
                    tokens.len(),
                    self.fees.len()
                ),
            });
        }
        if let Some(fee) = self.fees.iter().find(|&&f| f > MAX_POOL_FEE) {
            return Err(ToolError::InvalidParameter {
                field: "path.fees",
                reason: format!("fee {fee} exceeds uint24"),
            });
        }
        Ok((tokens, self.fees.clone()))
    }
}

fn parse_limit_sqrt_price(value: &Option<String>) -> Result<U160, ToolError> {
    match value {
        None => Ok(U160::ZERO),
        Some(s) => s.parse().map_err(|_| ToolError::InvalidParameter {
            field: "limit_sqrt_price",
            reason: format!("`{s}` is not a decimal uint160"),
        }),
    }
}

impl SwapPlugin {
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
                plugin: "swap".to_string(),
                chain_id,
            })
    }

    fn router(&self, deployment: &Deployment) -> SwapRouter {
        SwapRouter::new(self.wallet.clone(), deployment.swap_router)
    }

    async fn approve_input(
        &self,
        deployment: &Deployment,
        token_in: Address,
        amount: alloy::primitives::U256,
    ) -> Result<(), ToolError> {
        ensure_allowance(
            self.tokens.as_ref(),
            token_in,
            self.wallet.address(),
            deployment.swap_router,
            amount,
        )
        .await?;
        Ok(())
    }

    async fn exact_input_single(&self, params: ExactInputSingleParams) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let token_in = parse_address("token_in", &params.token_in)?;
        let token_out = parse_address("token_out", &params.token_out)?;
        let amount_in = parse_base_units("amount_in", &params.amount_in)?;
        let amount_out_minimum =
            parse_base_units("amount_out_minimum", &params.amount_out_minimum)?;
        let limit_sqrt_price = parse_limit_sqrt_price(&params.limit_sqrt_price)?;

        self.approve_input(&deployment, token_in, amount_in).await?;
        let tx = self
            .router(&deployment)
            .exact_input_single(
                token_in,
                token_out,
                amount_in,
                amount_out_minimum,
                limit_sqrt_price,
                deadline_from_now(params.deadline_seconds),
            )
            .await?;
        Ok(json!({ "tx": format!("{tx:?}") }))
    }

    async fn exact_output_single(
        &self,
        params: ExactOutputSingleParams,
    ) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let token_in = parse_address("token_in", &params.token_in)?;
        let token_out = parse_address("token_out", &params.token_out)?;
        let amount_out = parse_base_units("amount_out", &params.amount_out)?;
        let amount_in_maximum =
            parse_base_units("amount_in_maximum", &params.amount_in_maximum)?;
        let limit_sqrt_price = parse_limit_sqrt_price(&params.limit_sqrt_price)?;

        // The router pulls at most this much of the input token.
        self.approve_input(&deployment, token_in, amount_in_maximum)
            .await?;
        let tx = self
            .router(&deployment)
            .exact_output_single(
                token_in,
                token_out,
                amount_out,
                amount_in_maximum,
                limit_sqrt_price,
                deadline_from_now(params.deadline_seconds),
            )
            .await?;
        Ok(json!({ "tx": format!("{tx:?}") }))
    }

    async fn exact_input(&self, params: ExactInputParams) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let (tokens, fees) = params.path.resolve()?;
        let amount_in = parse_base_units("amount_in", &params.amount_in)?;
        let amount_out_minimum =
            parse_base_units("amount_out_minimum", &params.amount_out_minimum)?;
        let path = encode_path(&tokens, &fees)?;

        self.approve_input(&deployment, tokens[0], amount_in).await?;
        let tx = self
            .router(&deployment)
            .exact_input(
                path,
                amount_in,
                amount_out_minimum,
                deadline_from_now(params.deadline_seconds),
            )
            .await?;
        Ok(json!({ "tx": format!("{tx:?}") }))
    }

    async fn exact_output(&self, params: ExactOutputParams) -> Result<Value, ToolError> {
        let deployment = self.deployment()?;
        let (tokens, fees) = params.path.resolve()?;
        let amount_out = parse_base_units("amount_out", &params.amount_out)?;
        let amount_in_maximum =
            parse_base_units("amount_in_maximum", &params.amount_in_maximum)?;
        let path = encode_path(&tokens, &fees)?;

        self.approve_input(&deployment, tokens[0], amount_in_maximum)
            .await?;
        let tx = self
            .router(&deployment)
            .exact_output(
                path,
                amount_out,
                amount_in_maximum,
                deadline_from_now(params.deadline_seconds),
            )
            .await?;
        Ok(json!({ "tx": format!("{tx:?}") }))
    }
}

#[async_trait]
impl Plugin for SwapPlugin {
    fn name(&self) -> &str {
        "swap"
    }

    fn supports_chain(&self, chain_id: u64) -> bool {
        self.deployments.supports(chain_id)
    }

    fn tools(&self) -> Vec<ToolSpec> {
        let path_schema = json!({
            "type": "object",
            "properties": {
                "token_in": { "type": "string" },
                "intermediate_tokens": { "type": "array", "items": { "type": "string" } },
                "token_out": { "type": "string" },
                "fees": { "type": "array", "items": { "type": "integer" },
                          "description": "One pool fee per hop" },
            },
            "required": ["token_in", "token_out", "fees"],
        });
        vec![
            ToolSpec::new(
                "swap_exact_input_single",
                "Swap an exact amount of one token for another through a single pool. \
                 Amounts are base units.",
                json!({
                    "type": "object",
                    "properties": {
                        "token_in": { "type": "string" },
                        "token_out": { "type": "string" },
                        "amount_in": { "type": "string" },
                        "amount_out_minimum": { "type": "string" },
                        "limit_sqrt_price": { "type": "string", "description": "Optional price bound, 0 = none" },
                        "deadline_seconds": { "type": "integer" },
                    },
                    "required": ["token_in", "token_out", "amount_in", "amount_out_minimum"],
                }),
            ),
            ToolSpec::new(
                "swap_exact_output_single",
                "Swap for an exact amount of output through a single pool, spending at most \
                 amount_in_maximum. Amounts are base units.",
                json!({
                    "type": "object",
                    "properties": {
                        "token_in": { "type": "string" },
                        "token_out": { "type": "string" },
                        "amount_out": { "type": "string" },
                        "amount_in_maximum": { "type": "string" },
                        "limit_sqrt_price": { "type": "string", "description": "Optional price bound, 0 = none" },
                        "deadline_seconds": { "type": "integer" },
                    },
                    "required": ["token_in", "token_out", "amount_out", "amount_in_maximum"],
                }),
            ),
            ToolSpec::new(
                "swap_exact_input",
                "Swap an exact input amount along a multi-hop path. Amounts are base units.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": path_schema,
                        "amount_in": { "type": "string" },
                        "amount_out_minimum": { "type": "string" },
                        "deadline_seconds": { "type": "integer" },
                    },
                    "required": ["path", "amount_in", "amount_out_minimum"],
                }),
            ),
            ToolSpec::new(
                "swap_exact_output",
                "Swap for an exact output amount along a multi-hop path, spending at most \
                 amount_in_maximum. Amounts are base units.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": path_schema,
                        "amount_out": { "type": "string" },
                        "amount_in_maximum": { "type": "string" },
                        "deadline_seconds": { "type": "integer" },
                    },
                    "required": ["path", "amount_out", "amount_in_maximum"],
                }),
            ),
        ]
    }

    async fn execute(&self, tool: &str, params: &Value) -> Result<Value, ToolError> {
        match tool {
            "swap_exact_input_single" => self.exact_input_single(parse_params(params)?).await,
            "swap_exact_output_single" => self.exact_output_single(parse_params(params)?).await,
            "swap_exact_input" => self.exact_input(parse_params(params)?).await,
            "swap_exact_output" => self.exact_output(parse_params(params)?).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_requires_one_fee_per_hop() {
        let params = PathParams {
            token_in: "0x1111111111111111111111111111111111111111".to_string(),
            intermediate_tokens: vec!["0x2222222222222222222222222222222222222222".to_string()],
            token_out: "0x3333333333333333333333333333333333333333".to_string(),
            fees: vec![500],
        };
        assert!(params.resolve().is_err());

        let params = PathParams {
            fees: vec![500, 3000],
            ..params
        };
        let (tokens, fees) = params.resolve().unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(fees, vec![500, 3000]);
    }

    #[test]
    fn limit_sqrt_price_defaults_to_zero() {
        assert_eq!(parse_limit_sqrt_price(&None).unwrap(), U160::ZERO);
        assert!(parse_limit_sqrt_price(&Some("not-a-number".to_string())).is_err());
    }
}
