//! CoinGecko client for token metadata lookup.
//!
//! One endpoint is used: `coins/list?include_platform=true`, which returns
//! every listed coin with its per-platform contract addresses. The list is
//! large and changes slowly, so it is cached in-process after the first
//! fetch. Chain ids map to CoinGecko platform identifiers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::tokens::TokenMetadata;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// One entry of `coins/list`. Platform addresses can be null or empty.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinListEntry {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub platforms: HashMap<String, Option<String>>,
}

/// CoinGecko platform identifier for a chain id.
fn platform_for_chain(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("ethereum"),
        10 => Some("optimistic-ethereum"),
        137 => Some("polygon-pos"),
        8453 => Some("base"),
        34443 => Some("mode"),
        42161 => Some("arbitrum-one"),
        _ => None,
    }
}

/// Pick the first symbol match with a usable contract address on the chain's
/// platform. Ambiguous symbols resolve in list order, matching the upstream
/// API's ordering.
fn resolve(list: &[CoinListEntry], symbol: &str, chain_id: u64) -> Option<TokenMetadata> {
    let platform = platform_for_chain(chain_id)?;
    for entry in list {
        if !entry.symbol.eq_ignore_ascii_case(symbol) {
            continue;
        }
        let address = entry
            .platforms
            .get(platform)
            .and_then(|a| a.as_deref())
            .filter(|a| !a.is_empty());
        if let Some(address) = address {
            if let Ok(address) = address.parse() {
                return Some(TokenMetadata {
                    symbol: entry.symbol.to_uppercase(),
                    name: entry.name.clone(),
                    address,
                    decimals: None,
                });
            }
        }
    }
    None
}

/// Client for the CoinGecko API.
pub struct CoinGeckoClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    list_cache: RwLock<Option<Arc<Vec<CoinListEntry>>>>,
}

impl CoinGeckoClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            list_cache: RwLock::new(None),
        }
    }

    /// Set a demo API key (sent as `x-cg-demo-api-key`).
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the base URL (used against a local stub in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Find a token by symbol on a chain. `Ok(None)` means not found or no
    /// platform mapping for the chain; errors are transport/decode failures.
    #[instrument(skip(self))]
    pub async fn find_token(&self, symbol: &str, chain_id: u64) -> Result<Option<TokenMetadata>> {
        if platform_for_chain(chain_id).is_none() {
            debug!(chain_id, "No CoinGecko platform mapping for chain");
            return Ok(None);
        }
        let list = self.coin_list().await?;
        let found = resolve(&list, symbol, chain_id);
        debug!(symbol, chain_id, found = found.is_some(), "CoinGecko lookup complete");
        Ok(found)
    }

    async fn coin_list(&self) -> Result<Arc<Vec<CoinListEntry>>> {
        if let Some(cached) = self.list_cache.read().clone() {
            return Ok(cached);
        }

        let url = format!("{}coins/list?include_platform=true", self.base_url);
        let mut request = self.client.get(&url).header("accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }
        let response = request
            .send()
            .await
            .context("CoinGecko request failed")?
            .error_for_status()
            .context("CoinGecko returned an error status")?;
        let list: Vec<CoinListEntry> = response
            .json()
            .await
            .context("failed to decode CoinGecko coin list")?;
        debug!(coins = list.len(), "CoinGecko coin list fetched");

        let list = Arc::new(list);
        *self.list_cache.write() = Some(list.clone());
        Ok(list)
    }
}

impl Default for CoinGeckoClient {
    fn default() -> Self {
        Self::new()
    }
}
