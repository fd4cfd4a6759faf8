//! Core engine logic for the DeFi tool plugins.
//!
//! This crate provides:
//! - Loop deposit and loop withdraw engines for leveraged lending positions
//! - Allowance management (exact-amount approvals, no-op when sufficient)
//! - Position monitor math (LTV, health factor with a zero-debt sentinel)
//! - Basis-point / base-unit integer arithmetic
//! - Tool and plugin abstractions plus the dispatch registry
//! - The typed error taxonomy shared by every tool
//! - Per-chain deployment configuration

pub mod allowance;
pub mod config;
pub mod error;
pub mod loop_engine;
pub mod math;
pub mod position;
pub mod tool;

pub use allowance::ensure_allowance;
pub use config::{Deployment, Deployments};
pub use error::ToolError;
pub use loop_engine::{
    LoopDepositEngine, LoopWithdrawEngine, UnwindReport, UnwindStrategy, MAX_LOOPS,
};
pub use position::{HealthFactor, LoopPosition, PositionHealth};
pub use tool::{Plugin, ToolRegistry, ToolSpec};
