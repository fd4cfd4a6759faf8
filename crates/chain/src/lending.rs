//! Aave-style lending pool bindings and the `LendingMarket` seam.
//!
//! The pool handles deposits, withdrawals, borrows, and repayments; the
//! protocol data provider exposes reserve configuration and per-user reserve
//! state. Everything is variable-rate (mode 2); stable borrowing is not used.

use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::wallet::WalletClient;

// Return types widened to uint256/bool where the on-chain struct uses
// narrower words; selectors depend on argument types only.
sol! {
    interface ILendingPool {
        function deposit(address asset, uint256 amount, address onBehalfOf, uint16 referralCode) external;
        function withdraw(address asset, uint256 amount, address to) external returns (uint256);
        function borrow(address asset, uint256 amount, uint256 interestRateMode, uint16 referralCode, address onBehalfOf) external;
        function repay(address asset, uint256 amount, uint256 rateMode, address onBehalfOf) external returns (uint256);
    }

    interface IProtocolDataProvider {
        function getReserveConfigurationData(address asset) external view returns (
            uint256 decimals,
            uint256 ltv,
            uint256 liquidationThreshold,
            uint256 liquidationBonus,
            uint256 reserveFactor,
            bool usageAsCollateralEnabled,
            bool borrowingEnabled,
            bool stableBorrowRateEnabled,
            bool isActive,
            bool isFrozen
        );

        function getUserReserveData(address asset, address user) external view returns (
            uint256 currentATokenBalance,
            uint256 currentStableDebt,
            uint256 currentVariableDebt,
            uint256 principalStableDebt,
            uint256 scaledVariableDebt,
            uint256 stableBorrowRate,
            uint256 liquidityRate,
            uint256 stableRateLastUpdated,
            bool usageAsCollateralEnabled
        );
    }
}

/// Variable interest rate mode for borrow/repay.
pub const VARIABLE_RATE_MODE: u64 = 2;

/// Reserve configuration: LTV and liquidation threshold in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveConfig {
    pub decimals: u8,
    pub ltv_bps: u16,
    pub liquidation_threshold_bps: u16,
}

/// One user's position in one reserve. Ephemeral: re-read before every
/// state-dependent decision, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserReserve {
    /// aToken balance (deposited collateral, interest-bearing).
    pub collateral: U256,
    /// Current variable-rate debt.
    pub variable_debt: U256,
}

/// Lending market operations, behind a trait so the loop engines can run
/// against a stateful in-memory market in tests.
#[async_trait]
pub trait LendingMarket: Send + Sync {
    /// Address tokens must be approved for before deposit/repay.
    fn pool_address(&self) -> Address;

    async fn reserve_config(&self, asset: Address) -> Result<ReserveConfig>;
    async fn user_reserve(&self, asset: Address, user: Address) -> Result<UserReserve>;

    async fn deposit(&self, asset: Address, amount: U256, on_behalf_of: Address) -> Result<B256>;
    async fn withdraw(&self, asset: Address, amount: U256, to: Address) -> Result<B256>;
    async fn borrow(&self, asset: Address, amount: U256, on_behalf_of: Address) -> Result<B256>;
    async fn repay(&self, asset: Address, amount: U256, on_behalf_of: Address) -> Result<B256>;
}

/// Aave-compatible market over a `WalletClient`.
pub struct AaveMarket {
    wallet: Arc<dyn WalletClient>,
    pool: Address,
    data_provider: Address,
    referral_code: u16,
}

impl AaveMarket {
    pub fn new(wallet: Arc<dyn WalletClient>, pool: Address, data_provider: Address) -> Self {
        Self {
            wallet,
            pool,
            data_provider,
            referral_code: 0,
        }
    }

    pub fn with_referral_code(mut self, referral_code: u16) -> Self {
        self.referral_code = referral_code;
        self
    }
}

#[async_trait]
impl LendingMarket for AaveMarket {
    fn pool_address(&self) -> Address {
        self.pool
    }

    async fn reserve_config(&self, asset: Address) -> Result<ReserveConfig> {
        let calldata = IProtocolDataProvider::getReserveConfigurationDataCall { asset }.abi_encode();
        let data = self
            .wallet
            .call(self.data_provider, calldata.into())
            .await
            .with_context(|| format!("getReserveConfigurationData failed for {asset}"))?;
        let decoded =
            IProtocolDataProvider::getReserveConfigurationDataCall::abi_decode_returns(&data, true)
                .context("failed to decode getReserveConfigurationData")?;
        Ok(ReserveConfig {
            decimals: decoded.decimals.to::<u8>(),
            ltv_bps: decoded.ltv.to::<u16>(),
            liquidation_threshold_bps: decoded.liquidationThreshold.to::<u16>(),
        })
    }

    async fn user_reserve(&self, asset: Address, user: Address) -> Result<UserReserve> {
        let calldata = IProtocolDataProvider::getUserReserveDataCall { asset, user }.abi_encode();
        let data = self
            .wallet
            .call(self.data_provider, calldata.into())
            .await
            .with_context(|| format!("getUserReserveData failed for {asset}"))?;
        let decoded = IProtocolDataProvider::getUserReserveDataCall::abi_decode_returns(&data, true)
            .context("failed to decode getUserReserveData")?;
        Ok(UserReserve {
            collateral: decoded.currentATokenBalance,
            variable_debt: decoded.currentVariableDebt,
        })
    }

    async fn deposit(&self, asset: Address, amount: U256, on_behalf_of: Address) -> Result<B256> {
        let calldata = ILendingPool::depositCall {
            asset,
            amount,
            onBehalfOf: on_behalf_of,
            referralCode: self.referral_code,
        }
        .abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.pool, calldata.into(), U256::ZERO)
            .await
            .with_context(|| format!("deposit failed for {asset}"))?;
        debug!(asset = %asset, amount = %amount, tx = %tx_hash, "Deposit confirmed");
        Ok(tx_hash)
    }

    async fn withdraw(&self, asset: Address, amount: U256, to: Address) -> Result<B256> {
        let calldata = ILendingPool::withdrawCall { asset, amount, to }.abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.pool, calldata.into(), U256::ZERO)
            .await
            .with_context(|| format!("withdraw failed for {asset}"))?;
        debug!(asset = %asset, amount = %amount, tx = %tx_hash, "Withdrawal confirmed");
        Ok(tx_hash)
    }

    async fn borrow(&self, asset: Address, amount: U256, on_behalf_of: Address) -> Result<B256> {
        let calldata = ILendingPool::borrowCall {
            asset,
            amount,
            interestRateMode: U256::from(VARIABLE_RATE_MODE),
            referralCode: self.referral_code,
            onBehalfOf: on_behalf_of,
        }
        .abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.pool, calldata.into(), U256::ZERO)
            .await
            .with_context(|| format!("borrow failed for {asset}"))?;
        debug!(asset = %asset, amount = %amount, tx = %tx_hash, "Borrow confirmed");
        Ok(tx_hash)
    }

    async fn repay(&self, asset: Address, amount: U256, on_behalf_of: Address) -> Result<B256> {
        let calldata = ILendingPool::repayCall {
            asset,
            amount,
            rateMode: U256::from(VARIABLE_RATE_MODE),
            onBehalfOf: on_behalf_of,
        }
        .abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(self.pool, calldata.into(), U256::ZERO)
            .await
            .with_context(|| format!("repay failed for {asset}"))?;
        debug!(asset = %asset, amount = %amount, tx = %tx_hash, "Repay confirmed");
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_selectors_match_aave() {
        // deposit(address,uint256,address,uint16)
        assert_eq!(ILendingPool::depositCall::SELECTOR, [0xe8, 0xed, 0xa9, 0xdf]);
        // withdraw(address,uint256,address)
        assert_eq!(ILendingPool::withdrawCall::SELECTOR, [0x69, 0x32, 0x8d, 0xec]);
        // borrow(address,uint256,uint256,uint16,address)
        assert_eq!(ILendingPool::borrowCall::SELECTOR, [0xa4, 0x15, 0xbc, 0xad]);
        // repay(address,uint256,uint256,address)
        assert_eq!(ILendingPool::repayCall::SELECTOR, [0x57, 0x3a, 0xde, 0x81]);
    }

    #[test]
    fn borrow_calldata_uses_variable_rate() {
        let asset: Address = "0x1111111111111111111111111111111111111111"
            .parse()
            .unwrap();
        let user: Address = "0x2222222222222222222222222222222222222222"
            .parse()
            .unwrap();
        let calldata = ILendingPool::borrowCall {
            asset,
            amount: U256::from(500u64),
            interestRateMode: U256::from(VARIABLE_RATE_MODE),
            referralCode: 0,
            onBehalfOf: user,
        }
        .abi_encode();
        let decoded = ILendingPool::borrowCall::abi_decode(&calldata, true).unwrap();
        assert_eq!(decoded.interestRateMode, U256::from(2u64));
        assert_eq!(decoded.onBehalfOf, user);
    }
}
