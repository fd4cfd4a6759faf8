//! Restaking plugin: deposit into a restaking vault that accepts one token.
//!
//! The vault's accepted token is read on-chain and checked against the
//! caller's token before any value moves.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use agentfi_chain::erc20::Erc20;
use agentfi_chain::restaking::RestakeVault;
use agentfi_chain::swap::deadline_from_now;
use agentfi_chain::WalletClient;
use agentfi_core::allowance::ensure_allowance;
use agentfi_core::config::Deployments;
use agentfi_core::error::ToolError;
use agentfi_core::math::parse_base_units;
use agentfi_core::tool::{parse_address, parse_params, Plugin, ToolSpec};

use alloy::primitives::Address;

const DEFAULT_DEADLINE_SECONDS: u64 = 300;

fn default_deadline() -> u64 {
    DEFAULT_DEADLINE_SECONDS
}

pub struct RestakingPlugin {
    wallet: Arc<dyn WalletClient>,
    tokens: Arc<Erc20>,
    deployments: Deployments,
}

#[derive(Deserialize)]
struct RestakeDepositParams {
    token: String,
    amount: String,
    min_out: String,
    #[serde(default = "default_deadline")]
    deadline_seconds: u64,
}

impl RestakingPlugin {
    pub fn new(wallet: Arc<dyn WalletClient>, deployments: Deployments) -> Self {
        let tokens = Arc::new(Erc20::new(wallet.clone()));
        Self {
            wallet,
            tokens,
            deployments,
        }
    }

    fn vault_address(&self) -> Result<Address, ToolError> {
        let chain_id = self.wallet.chain_id();
        self.deployments
            .get(chain_id)
            .and_then(|d| d.restaking_deposit)
            .ok_or(ToolError::UnsupportedChain {
                plugin: "restaking".to_string(),
                chain_id,
            })
    }

    async fn restake_deposit(&self, params: RestakeDepositParams) -> Result<Value, ToolError> {
        let vault_address = self.vault_address()?;
        let token = parse_address("token", &params.token)?;
        let amount = parse_base_units("amount", &params.amount)?;
        let min_out = parse_base_units("min_out", &params.min_out)?;
        if amount.is_zero() {
            return Err(ToolError::InvalidParameter {
                field: "amount",
                reason: "must be positive".to_string(),
            });
        }

        let vault = RestakeVault::new(self.wallet.clone(), vault_address);
        let accepted = vault.deposit_token().await?;
        if accepted != token {
            return Err(ToolError::InvalidParameter {
                field: "token",
                reason: format!("vault accepts {accepted}, not {token}"),
            });
        }

        ensure_allowance(
            self.tokens.as_ref(),
            token,
            self.wallet.address(),
            vault_address,
            amount,
        )
        .await?;
        let tx = vault
            .deposit(amount, min_out, deadline_from_now(params.deadline_seconds))
            .await?;

        info!(vault = %vault_address, amount = %amount, "Restake deposit complete");
        Ok(json!({ "tx": format!("{tx:?}") }))
    }
}

#[async_trait]
impl Plugin for RestakingPlugin {
    fn name(&self) -> &str {
        "restaking"
    }

    fn supports_chain(&self, chain_id: u64) -> bool {
        self.deployments
            .get(chain_id)
            .is_some_and(|d| d.restaking_deposit.is_some())
    }

    fn tools(&self) -> Vec<ToolSpec> {
        vec![ToolSpec::new(
            "restake_deposit",
            "Deposit the vault's accepted token into the restaking vault. The token is \
             verified against the vault before depositing. Amounts are base units.",
            json!({
                "type": "object",
                "properties": {
                    "token": { "type": "string", "description": "Token to deposit" },
                    "amount": { "type": "string", "description": "Amount in base units" },
                    "min_out": { "type": "string", "description": "Minimum restaked tokens out" },
                    "deadline_seconds": { "type": "integer" },
                },
                "required": ["token", "amount", "min_out"],
            }),
        )]
    }

    async fn execute(&self, tool: &str, params: &Value) -> Result<Value, ToolError> {
        match tool {
            "restake_deposit" => self.restake_deposit(parse_params(params)?).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}
