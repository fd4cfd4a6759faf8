//! Nonfungible position manager bindings for Algebra-style concentrated
//! liquidity pools.
//!
//! Pools are looked up per pair through the factory (no fee tier in the key);
//! tick ranges are derived from the pool's current tick rounded down to the
//! pool tick spacing.

use alloy::primitives::{aliases::I24, Address, B256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

use crate::wallet::WalletClient;

// Return types widened where the on-chain word is narrower; argument structs
// match the deployed ABI exactly.
sol! {
    struct MintParams {
        address token0;
        address token1;
        int24 tickLower;
        int24 tickUpper;
        uint256 amount0Desired;
        uint256 amount1Desired;
        uint256 amount0Min;
        uint256 amount1Min;
        address recipient;
        uint256 deadline;
    }

    struct IncreaseLiquidityParams {
        uint256 tokenId;
        uint256 amount0Desired;
        uint256 amount1Desired;
        uint256 amount0Min;
        uint256 amount1Min;
        uint256 deadline;
    }

    struct DecreaseLiquidityParams {
        uint256 tokenId;
        uint128 liquidity;
        uint256 amount0Min;
        uint256 amount1Min;
        uint256 deadline;
    }

    struct CollectParams {
        uint256 tokenId;
        address recipient;
        uint128 amount0Max;
        uint128 amount1Max;
    }

    interface INonfungiblePositionManager {
        function mint(MintParams params) external payable returns (uint256 tokenId, uint256 liquidity, uint256 amount0, uint256 amount1);
        function increaseLiquidity(IncreaseLiquidityParams params) external payable returns (uint256 liquidity, uint256 amount0, uint256 amount1);
        function decreaseLiquidity(DecreaseLiquidityParams params) external payable returns (uint256 amount0, uint256 amount1);
        function collect(CollectParams params) external payable returns (uint256 amount0, uint256 amount1);
        function burn(uint256 tokenId) external payable;
        function positions(uint256 tokenId) external view returns (
            uint256 nonce,
            address operator,
            address token0,
            address token1,
            int256 tickLower,
            int256 tickUpper,
            uint256 liquidity,
            uint256 feeGrowthInside0LastX128,
            uint256 feeGrowthInside1LastX128,
            uint256 tokensOwed0,
            uint256 tokensOwed1
        );
    }

    interface IAlgebraFactory {
        function poolByPair(address tokenA, address tokenB) external view returns (address pool);
    }

    interface IAlgebraPool {
        function globalState() external view returns (
            uint256 price,
            int256 tick,
            uint256 fee,
            uint256 timepointIndex,
            uint256 communityFeeToken0,
            uint256 communityFeeToken1,
            bool unlocked
        );
    }
}

/// Tick spacing of the target pools.
pub const TICK_SPACING: i32 = 60;

/// How many spacings on each side of the current tick a default range spans.
const RANGE_SPACINGS: i32 = 5;

/// A tick range aligned to `TICK_SPACING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRange {
    pub lower: i32,
    pub upper: i32,
}

impl TickRange {
    /// Default range around `current_tick`: round down to the nearest spacing
    /// multiple (floor division, so negative ticks round toward -infinity),
    /// then span `RANGE_SPACINGS` spacings on each side.
    pub fn around(current_tick: i32) -> Self {
        let nearest = current_tick.div_euclid(TICK_SPACING) * TICK_SPACING;
        Self {
            lower: nearest - TICK_SPACING * RANGE_SPACINGS,
            upper: nearest + TICK_SPACING * RANGE_SPACINGS,
        }
    }
}

/// A position's on-chain state (the fields the tools need).
#[derive(Debug, Clone, Copy)]
pub struct PositionState {
    pub token0: Address,
    pub token1: Address,
    pub liquidity: U256,
}

/// Typed wrapper over the position manager, factory, and pool state reads.
/// Token approvals are the caller's responsibility.
pub struct PositionManager {
    wallet: Arc<dyn WalletClient>,
    manager: Address,
    factory: Address,
}

impl PositionManager {
    pub fn new(wallet: Arc<dyn WalletClient>, manager: Address, factory: Address) -> Self {
        Self {
            wallet,
            manager,
            factory,
        }
    }

    pub fn address(&self) -> Address {
        self.manager
    }

    /// Pool address for a (sorted) token pair.
    pub async fn pool_for(&self, token0: Address, token1: Address) -> Result<Address> {
        let calldata = IAlgebraFactory::poolByPairCall {
            tokenA: token0,
            tokenB: token1,
        }
        .abi_encode();
        let data = self
            .wallet
            .call(self.factory, calldata.into())
            .await
            .context("poolByPair call failed")?;
        let decoded = IAlgebraFactory::poolByPairCall::abi_decode_returns(&data, true)
            .context("failed to decode poolByPair")?;
        if decoded.pool == Address::ZERO {
            anyhow::bail!("no pool deployed for pair {token0}/{token1}");
        }
        Ok(decoded.pool)
    }

    /// Current tick of a pool.
    pub async fn current_tick(&self, pool: Address) -> Result<i32> {
        let calldata = IAlgebraPool::globalStateCall {}.abi_encode();
        let data = self
            .wallet
            .call(pool, calldata.into())
            .await
            .context("globalState call failed")?;
        let decoded = IAlgebraPool::globalStateCall::abi_decode_returns(&data, true)
            .context("failed to decode globalState")?;
        let tick = i64::try_from(decoded.tick)
            .ok()
            .and_then(|t| i32::try_from(t).ok())
            .with_context(|| format!("tick {} out of range", decoded.tick))?;
        Ok(tick)
    }

    /// Position state for a token id. Index 6 of `positions()` is liquidity.
    pub async fn position(&self, token_id: U256) -> Result<PositionState> {
        let calldata = INonfungiblePositionManager::positionsCall { tokenId: token_id }.abi_encode();
        let data = self
            .wallet
            .call(self.manager, calldata.into())
            .await
            .context("positions call failed")?;
        let decoded = INonfungiblePositionManager::positionsCall::abi_decode_returns(&data, true)
            .context("failed to decode positions")?;
        Ok(PositionState {
            token0: decoded.token0,
            token1: decoded.token1,
            liquidity: decoded.liquidity,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn mint(
        &self,
        token0: Address,
        token1: Address,
        range: TickRange,
        amount0_desired: U256,
        amount1_desired: U256,
        recipient: Address,
        deadline: U256,
    ) -> Result<B256> {
        let calldata = INonfungiblePositionManager::mintCall {
            params: MintParams {
                token0,
                token1,
                tickLower: I24::try_from(range.lower).context("tickLower out of int24 range")?,
                tickUpper: I24::try_from(range.upper).context("tickUpper out of int24 range")?,
                amount0Desired: amount0_desired,
                amount1Desired: amount1_desired,
                amount0Min: U256::ZERO,
                amount1Min: U256::ZERO,
                recipient,
                deadline,
            },
        }
        .abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.manager, calldata.into(), U256::ZERO)
            .await
            .context("mint failed")?;
        debug!(token0 = %token0, token1 = %token1, lower = range.lower, upper = range.upper, tx = %tx_hash, "Position minted");
        Ok(tx_hash)
    }

    pub async fn increase_liquidity(
        &self,
        token_id: U256,
        amount0_desired: U256,
        amount1_desired: U256,
        deadline: U256,
    ) -> Result<B256> {
        let calldata = INonfungiblePositionManager::increaseLiquidityCall {
            params: IncreaseLiquidityParams {
                tokenId: token_id,
                amount0Desired: amount0_desired,
                amount1Desired: amount1_desired,
                amount0Min: U256::ZERO,
                amount1Min: U256::ZERO,
                deadline,
            },
        }
        .abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.manager, calldata.into(), U256::ZERO)
            .await
            .context("increaseLiquidity failed")?;
        debug!(token_id = %token_id, tx = %tx_hash, "Liquidity increased");
        Ok(tx_hash)
    }

    pub async fn decrease_liquidity(
        &self,
        token_id: U256,
        liquidity: u128,
        deadline: U256,
    ) -> Result<B256> {
        let calldata = INonfungiblePositionManager::decreaseLiquidityCall {
            params: DecreaseLiquidityParams {
                tokenId: token_id,
                liquidity,
                amount0Min: U256::ZERO,
                amount1Min: U256::ZERO,
                deadline,
            },
        }
        .abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.manager, calldata.into(), U256::ZERO)
            .await
            .context("decreaseLiquidity failed")?;
        debug!(token_id = %token_id, liquidity = liquidity, tx = %tx_hash, "Liquidity decreased");
        Ok(tx_hash)
    }

    pub async fn collect(
        &self,
        token_id: U256,
        recipient: Address,
        amount0_max: u128,
        amount1_max: u128,
    ) -> Result<B256> {
        let calldata = INonfungiblePositionManager::collectCall {
            params: CollectParams {
                tokenId: token_id,
                recipient,
                amount0Max: amount0_max,
                amount1Max: amount1_max,
            },
        }
        .abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.manager, calldata.into(), U256::ZERO)
            .await
            .context("collect failed")?;
        debug!(token_id = %token_id, tx = %tx_hash, "Fees collected");
        Ok(tx_hash)
    }

    pub async fn burn(&self, token_id: U256) -> Result<B256> {
        let calldata = INonfungiblePositionManager::burnCall { tokenId: token_id }.abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.manager, calldata.into(), U256::ZERO)
            .await
            .context("burn failed")?;
        debug!(token_id = %token_id, tx = %tx_hash, "Position burned");
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_range_rounds_down_to_spacing() {
        // 1234 / 60 -> 20 * 60 = 1200
        assert_eq!(
            TickRange::around(1234),
            TickRange {
                lower: 1200 - 300,
                upper: 1200 + 300
            }
        );
        // Exactly on a spacing boundary
        assert_eq!(
            TickRange::around(600),
            TickRange {
                lower: 300,
                upper: 900
            }
        );
    }

    #[test]
    fn tick_range_floors_negative_ticks() {
        // -50 rounds down to -60, not up to 0
        assert_eq!(
            TickRange::around(-50),
            TickRange {
                lower: -60 - 300,
                upper: -60 + 300
            }
        );
    }

    #[test]
    fn decrease_liquidity_calldata_roundtrip() {
        let call = INonfungiblePositionManager::decreaseLiquidityCall {
            params: DecreaseLiquidityParams {
                tokenId: U256::from(7u64),
                liquidity: 1_000_000u128,
                amount0Min: U256::ZERO,
                amount1Min: U256::ZERO,
                deadline: U256::from(1_700_000_000u64),
            },
        };
        let calldata = call.abi_encode();
        let decoded =
            INonfungiblePositionManager::decreaseLiquidityCall::abi_decode(&calldata, true)
                .unwrap();
        assert_eq!(decoded.params.tokenId, U256::from(7u64));
        assert_eq!(decoded.params.liquidity, 1_000_000u128);
    }
}
