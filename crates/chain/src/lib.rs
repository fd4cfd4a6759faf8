//! Chain interaction layer.
//!
//! This crate provides:
//! - `WalletClient` trait: the read/write boundary every contract wrapper goes through
//! - `EvmWallet`: alloy-backed implementation with cached nonce and configurable gas
//! - Typed `sol!` bindings and wrappers: ERC20, Aave-style lending pool + data
//!   provider, Algebra-style swap router, nonfungible position manager, restaking
//!   deposit contract
//!
//! Wrappers never retry and never cache chain state (the ERC20 decimals cache is
//! the one exception; decimals are immutable in practice).

pub mod erc20;
pub mod lending;
pub mod liquidity;
pub mod restaking;
pub mod swap;
pub mod wallet;

pub use erc20::{Erc20, TokenOps};
pub use lending::{AaveMarket, LendingMarket, ReserveConfig, UserReserve};
pub use liquidity::{PositionManager, PositionState, TickRange, TICK_SPACING};
pub use restaking::RestakeVault;
pub use swap::SwapRouter;
pub use wallet::{EvmWallet, GasSettings, NonceManager, WalletClient};
