//! DeFi tool plugins for AI agent harnesses.
//!
//! Each plugin groups the tools for one protocol surface: leveraged lending
//! loops, token swaps, concentrated-liquidity positions, token metadata
//! lookup, and restaking deposits. A harness builds a [`ToolRegistry`] over a
//! connected wallet and dispatches tool calls by name; all monetary amounts
//! cross the tool boundary as base-unit decimal strings.

use std::sync::Arc;

use agentfi_chain::WalletClient;
use agentfi_core::{Deployments, ToolRegistry};

pub mod lending;
pub mod liquidity;
pub mod restaking;
pub mod swap;
pub mod token_info;

pub use lending::LendingPlugin;
pub use liquidity::LiquidityPlugin;
pub use restaking::RestakingPlugin;
pub use swap::SwapPlugin;
pub use token_info::TokenInfoPlugin;

/// Build a registry with every plugin over one wallet and deployment table.
pub fn registry(wallet: Arc<dyn WalletClient>, deployments: Deployments) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(LendingPlugin::new(
        wallet.clone(),
        deployments.clone(),
    )));
    registry.register(Arc::new(SwapPlugin::new(
        wallet.clone(),
        deployments.clone(),
    )));
    registry.register(Arc::new(LiquidityPlugin::new(
        wallet.clone(),
        deployments.clone(),
    )));
    registry.register(Arc::new(TokenInfoPlugin::new(wallet.clone())));
    registry.register(Arc::new(RestakingPlugin::new(wallet, deployments)));
    registry
}
