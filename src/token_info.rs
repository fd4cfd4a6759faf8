//! Token metadata plugin: resolve a symbol to its contract address and
//! decimals on the wallet's chain.
//!
//! Resolution checks the built-in token table first and falls back to
//! CoinGecko. A lookup that finds nothing returns JSON null rather than an
//! error, so a harness can treat "unknown token" as an answer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use agentfi_api::{known_token, CoinGeckoClient, TokenMetadata};
use agentfi_chain::TokenOps;
use agentfi_chain::erc20::Erc20;
use agentfi_chain::WalletClient;
use agentfi_core::error::ToolError;
use agentfi_core::tool::{parse_params, Plugin, ToolSpec};

pub struct TokenInfoPlugin {
    wallet: Arc<dyn WalletClient>,
    tokens: Arc<Erc20>,
    client: CoinGeckoClient,
}

#[derive(Deserialize)]
struct TokenInfoParams {
    symbol: String,
}

impl TokenInfoPlugin {
    pub fn new(wallet: Arc<dyn WalletClient>) -> Self {
        let tokens = Arc::new(Erc20::new(wallet.clone()));
        Self {
            wallet,
            tokens,
            client: CoinGeckoClient::new(),
        }
    }

    pub fn with_client(mut self, client: CoinGeckoClient) -> Self {
        self.client = client;
        self
    }

    async fn resolve(&self, symbol: &str) -> Option<TokenMetadata> {
        let chain_id = self.wallet.chain_id();
        if let Some(token) = known_token(symbol, chain_id) {
            return Some(token);
        }
        match self.client.find_token(symbol, chain_id).await {
            Ok(found) => found,
            Err(error) => {
                warn!(symbol, %error, "Token metadata lookup failed");
                None
            }
        }
    }

    async fn get_token_info(&self, params: TokenInfoParams) -> Result<Value, ToolError> {
        let Some(mut token) = self.resolve(&params.symbol).await else {
            return Ok(Value::Null);
        };
        if token.decimals.is_none() {
            match self.tokens.decimals(token.address).await {
                Ok(decimals) => token.decimals = Some(decimals),
                Err(error) => {
                    warn!(address = %token.address, %error, "Failed to read token decimals");
                }
            }
        }
        Ok(json!({
            "symbol": token.symbol,
            "name": token.name,
            "contract_address": format!("{:?}", token.address),
            "decimals": token.decimals,
        }))
    }
}

#[async_trait]
impl Plugin for TokenInfoPlugin {
    fn name(&self) -> &str {
        "token_info"
    }

    fn supports_chain(&self, _chain_id: u64) -> bool {
        true
    }

    fn tools(&self) -> Vec<ToolSpec> {
        vec![ToolSpec::new(
            "get_token_info",
            "Look up a token by symbol on the connected chain. Returns the symbol, name, \
             contract address, and decimals, or null when the token is unknown.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": { "type": "string", "description": "Token symbol, e.g. USDC" },
                },
                "required": ["symbol"],
            }),
        )]
    }

    async fn execute(&self, tool: &str, params: &Value) -> Result<Value, ToolError> {
        match tool {
            "get_token_info" => self.get_token_info(parse_params(params)?).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}
