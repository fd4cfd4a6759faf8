//! Algebra-style swap router bindings.
//!
//! Single-hop swaps take a params struct with a `limitSqrtPrice` bound;
//! multi-hop swaps take a path encoded as `(address[], uint24[])`.

use alloy::primitives::{
    aliases::{U160, U24},
    Address, Bytes, B256, U256,
};
use alloy::sol;
use alloy::sol_types::{SolCall, SolValue};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

use crate::wallet::WalletClient;

sol! {
    struct ExactInputSingleParams {
        address tokenIn;
        address tokenOut;
        address recipient;
        uint256 deadline;
        uint256 amountIn;
        uint256 amountOutMinimum;
        uint160 limitSqrtPrice;
    }

    struct ExactOutputSingleParams {
        address tokenIn;
        address tokenOut;
        address recipient;
        uint256 deadline;
        uint256 amountOut;
        uint256 amountInMaximum;
        uint160 limitSqrtPrice;
    }

    interface ISwapRouter {
        function exactInputSingle(ExactInputSingleParams params) external payable returns (uint256 amountOut);
        function exactOutputSingle(ExactOutputSingleParams params) external payable returns (uint256 amountIn);
        function exactInput(bytes path, address recipient, uint256 deadline, uint256 amountIn, uint256 amountOutMinimum) external payable returns (uint256 amountOut);
        function exactOutput(bytes path, address recipient, uint256 deadline, uint256 amountOut, uint256 amountInMaximum) external payable returns (uint256 amountIn);
    }
}

/// Encode a multi-hop path as `(address[], uint24[])`. The fee list has one
/// entry per hop (`tokens.len() - 1`); callers validate lengths before this.
pub fn encode_path(tokens: &[Address], fees: &[u32]) -> Result<Bytes> {
    let fees: Vec<U24> = fees
        .iter()
        .map(|&fee| U24::try_from(fee).context("pool fee exceeds uint24"))
        .collect::<Result<_>>()?;
    let encoded = (tokens.to_vec(), fees).abi_encode_params();
    Ok(encoded.into())
}

/// Unix deadline `seconds` from now.
pub fn deadline_from_now(seconds: u64) -> U256 {
    U256::from(chrono::Utc::now().timestamp() as u64 + seconds)
}

/// Typed wrapper over the swap router. Approvals for the input token are the
/// caller's responsibility.
pub struct SwapRouter {
    wallet: Arc<dyn WalletClient>,
    router: Address,
}

impl SwapRouter {
    pub fn new(wallet: Arc<dyn WalletClient>, router: Address) -> Self {
        Self { wallet, router }
    }

    pub fn address(&self) -> Address {
        self.router
    }

    pub async fn exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        amount_out_minimum: U256,
        limit_sqrt_price: U160,
        deadline: U256,
    ) -> Result<B256> {
        let calldata = ISwapRouter::exactInputSingleCall {
            params: ExactInputSingleParams {
                tokenIn: token_in,
                tokenOut: token_out,
                recipient: self.wallet.address(),
                deadline,
                amountIn: amount_in,
                amountOutMinimum: amount_out_minimum,
                limitSqrtPrice: limit_sqrt_price,
            },
        }
        .abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.router, calldata.into(), U256::ZERO)
            .await
            .context("exactInputSingle failed")?;
        debug!(token_in = %token_in, token_out = %token_out, amount_in = %amount_in, tx = %tx_hash, "Swap confirmed");
        Ok(tx_hash)
    }

    pub async fn exact_output_single(
        &self,
        token_in: Address,
        token_out: Address,
        amount_out: U256,
        amount_in_maximum: U256,
        limit_sqrt_price: U160,
        deadline: U256,
    ) -> Result<B256> {
        let calldata = ISwapRouter::exactOutputSingleCall {
            params: ExactOutputSingleParams {
                tokenIn: token_in,
                tokenOut: token_out,
                recipient: self.wallet.address(),
                deadline,
                amountOut: amount_out,
                amountInMaximum: amount_in_maximum,
                limitSqrtPrice: limit_sqrt_price,
            },
        }
        .abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.router, calldata.into(), U256::ZERO)
            .await
            .context("exactOutputSingle failed")?;
        debug!(token_in = %token_in, token_out = %token_out, amount_out = %amount_out, tx = %tx_hash, "Swap confirmed");
        Ok(tx_hash)
    }

    pub async fn exact_input(
        &self,
        path: Bytes,
        amount_in: U256,
        amount_out_minimum: U256,
        deadline: U256,
    ) -> Result<B256> {
        let calldata = ISwapRouter::exactInputCall {
            path,
            recipient: self.wallet.address(),
            deadline,
            amountIn: amount_in,
            amountOutMinimum: amount_out_minimum,
        }
        .abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.router, calldata.into(), U256::ZERO)
            .await
            .context("exactInput failed")?;
        debug!(amount_in = %amount_in, tx = %tx_hash, "Multi-hop swap confirmed");
        Ok(tx_hash)
    }

    pub async fn exact_output(
        &self,
        path: Bytes,
        amount_out: U256,
        amount_in_maximum: U256,
        deadline: U256,
    ) -> Result<B256> {
        let calldata = ISwapRouter::exactOutputCall {
            path,
            recipient: self.wallet.address(),
            deadline,
            amountOut: amount_out,
            amountInMaximum: amount_in_maximum,
        }
        .abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.router, calldata.into(), U256::ZERO)
            .await
            .context("exactOutput failed")?;
        debug!(amount_out = %amount_out, tx = %tx_hash, "Multi-hop swap confirmed");
        Ok(tx_hash)
    }
}
