//! HTTP clients for external services.
//!
//! This crate provides:
//! - CoinGecko: token metadata lookup by symbol, with per-chain platform
//!   mapping and an in-process token-list cache
//! - A built-in table of well-known tokens checked before any network call

pub mod coingecko;
pub mod tokens;

pub use coingecko::{CoinGeckoClient, CoinListEntry};
pub use tokens::{known_token, TokenMetadata};
