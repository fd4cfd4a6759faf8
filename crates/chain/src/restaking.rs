//! Restaking deposit contract bindings.
//!
//! The vault accepts exactly one deposit token, discoverable on-chain via
//! `depositToken()`; deposits take a minimum-out bound and a deadline.

use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

use crate::wallet::WalletClient;

sol! {
    interface IRestakeDeposit {
        function depositToken() external view returns (address);
        function deposit(uint256 amountIn, uint256 minOut, uint256 deadline) external returns (uint256);
    }
}

/// Typed wrapper over the restaking deposit contract.
pub struct RestakeVault {
    wallet: Arc<dyn WalletClient>,
    vault: Address,
}

impl RestakeVault {
    pub fn new(wallet: Arc<dyn WalletClient>, vault: Address) -> Self {
        Self { wallet, vault }
    }

    pub fn address(&self) -> Address {
        self.vault
    }

    /// The token the vault accepts.
    pub async fn deposit_token(&self) -> Result<Address> {
        let calldata = IRestakeDeposit::depositTokenCall {}.abi_encode();
        let data = self
            .wallet
            .call(self.vault, calldata.into())
            .await
            .context("depositToken call failed")?;
        let decoded = IRestakeDeposit::depositTokenCall::abi_decode_returns(&data, true)
            .context("failed to decode depositToken")?;
        Ok(decoded._0)
    }

    pub async fn deposit(&self, amount_in: U256, min_out: U256, deadline: U256) -> Result<B256> {
        let calldata = IRestakeDeposit::depositCall {
            amountIn: amount_in,
            minOut: min_out,
            deadline,
        }
        .abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.vault, calldata.into(), U256::ZERO)
            .await
            .context("restake deposit failed")?;
        debug!(amount_in = %amount_in, min_out = %min_out, tx = %tx_hash, "Restake deposit confirmed");
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_calldata_roundtrip() {
        let call = IRestakeDeposit::depositCall {
            amountIn: U256::from(1_000u64),
            minOut: U256::from(990u64),
            deadline: U256::from(1_700_000_000u64),
        };
        let calldata = call.abi_encode();
        let decoded = IRestakeDeposit::depositCall::abi_decode(&calldata, true).unwrap();
        assert_eq!(decoded.amountIn, U256::from(1_000u64));
        assert_eq!(decoded.minOut, U256::from(990u64));
    }
}
