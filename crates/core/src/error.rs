//! Typed error taxonomy for tool execution.
//!
//! Validation errors are raised before any transaction is sent. Precondition
//! errors (`HealthFactorBreach`, `UnwindStalled`) are deliberate guards, not
//! failures of the chain. `External` wraps chain/API failures with context;
//! nothing is retried.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    /// Parameter rejected before any transaction was sent.
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter {
        field: &'static str,
        reason: String,
    },

    /// No registered plugin exposes this tool.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The plugin's contracts are not deployed on this chain.
    #[error("plugin `{plugin}` does not support chain {chain_id}")]
    UnsupportedChain { plugin: String, chain_id: u64 },

    /// Withdrawing anything now would push the health factor below 1.
    #[error("cannot withdraw without breaching health factor")]
    HealthFactorBreach,

    /// The unwind loop stopped making progress.
    #[error("unwind made no progress after {0} iterations")]
    UnwindStalled(u32),

    /// A chain or API call failed. Never retried.
    #[error(transparent)]
    External(#[from] anyhow::Error),
}
