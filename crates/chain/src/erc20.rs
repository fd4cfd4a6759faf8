//! ERC20 bindings and token operations.

use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::wallet::WalletClient;

sol! {
    interface IERC20 {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

/// Token reads and approvals, behind a trait so engines can run against an
/// in-memory implementation in tests.
#[async_trait]
pub trait TokenOps: Send + Sync {
    async fn decimals(&self, token: Address) -> Result<u8>;
    async fn symbol(&self, token: Address) -> Result<String>;
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256>;
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;
    /// Approve `spender` for exactly `amount` and await inclusion.
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<B256>;
}

/// ERC20 wrapper over a `WalletClient`. Decimals are cached per token
/// (immutable in practice); everything else is read fresh.
pub struct Erc20 {
    wallet: Arc<dyn WalletClient>,
    decimals_cache: DashMap<Address, u8>,
}

impl Erc20 {
    pub fn new(wallet: Arc<dyn WalletClient>) -> Self {
        Self {
            wallet,
            decimals_cache: DashMap::new(),
        }
    }
}

#[async_trait]
impl TokenOps for Erc20 {
    async fn decimals(&self, token: Address) -> Result<u8> {
        if let Some(cached) = self.decimals_cache.get(&token) {
            return Ok(*cached);
        }
        let calldata = IERC20::decimalsCall {}.abi_encode();
        let data = self
            .wallet
            .call(token, calldata.into())
            .await
            .with_context(|| format!("decimals() call failed for {token}"))?;
        let decoded = IERC20::decimalsCall::abi_decode_returns(&data, true)
            .context("failed to decode decimals()")?;
        self.decimals_cache.insert(token, decoded._0);
        debug!(token = %token, decimals = decoded._0, "Token decimals cached");
        Ok(decoded._0)
    }

    async fn symbol(&self, token: Address) -> Result<String> {
        let calldata = IERC20::symbolCall {}.abi_encode();
        let data = self
            .wallet
            .call(token, calldata.into())
            .await
            .with_context(|| format!("symbol() call failed for {token}"))?;
        let decoded = IERC20::symbolCall::abi_decode_returns(&data, true)
            .context("failed to decode symbol()")?;
        Ok(decoded._0)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let calldata = IERC20::balanceOfCall { account: owner }.abi_encode();
        let data = self
            .wallet
            .call(token, calldata.into())
            .await
            .with_context(|| format!("balanceOf() call failed for {token}"))?;
        let decoded = IERC20::balanceOfCall::abi_decode_returns(&data, true)
            .context("failed to decode balanceOf()")?;
        Ok(decoded._0)
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let calldata = IERC20::allowanceCall { owner, spender }.abi_encode();
        let data = self
            .wallet
            .call(token, calldata.into())
            .await
            .with_context(|| format!("allowance() call failed for {token}"))?;
        let decoded = IERC20::allowanceCall::abi_decode_returns(&data, true)
            .context("failed to decode allowance()")?;
        Ok(decoded._0)
    }

    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<B256> {
        let calldata = IERC20::approveCall { spender, amount }.abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(token, calldata.into(), U256::ZERO)
            .await
            .with_context(|| format!("approve() failed for {token}"))?;
        debug!(token = %token, spender = %spender, amount = %amount, tx = %tx_hash, "Approval confirmed");
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erc20_selectors() {
        assert_eq!(IERC20::decimalsCall::SELECTOR, [0x31, 0x3c, 0xe5, 0x67]);
        assert_eq!(IERC20::balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(IERC20::allowanceCall::SELECTOR, [0xdd, 0x62, 0xed, 0x3e]);
        assert_eq!(IERC20::approveCall::SELECTOR, [0x09, 0x5e, 0xa7, 0xb3]);
    }

    #[test]
    fn approve_calldata_layout() {
        let spender: Address = "0x2222222222222222222222222222222222222222"
            .parse()
            .unwrap();
        let calldata = IERC20::approveCall {
            spender,
            amount: U256::from(1_000u64),
        }
        .abi_encode();
        // selector + 2 words
        assert_eq!(calldata.len(), 4 + 32 + 32);
        let decoded = IERC20::approveCall::abi_decode(&calldata, true).unwrap();
        assert_eq!(decoded.spender, spender);
        assert_eq!(decoded.amount, U256::from(1_000u64));
    }
}
