//! Per-chain deployment configuration.
//!
//! A `Deployment` names every contract the plugins touch on one chain. Mode
//! mainnet ships as a built-in default; other chains load from TOML.

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Mode mainnet chain id.
pub const MODE_MAINNET: u64 = 34443;

/// Contract addresses for one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub chain_id: u64,
    /// Aave-style lending pool
    pub lending_pool: Address,
    /// Protocol data provider (reserve configuration + user reserve data)
    pub data_provider: Address,
    /// Algebra-style swap router
    pub swap_router: Address,
    /// Nonfungible position manager
    pub position_manager: Address,
    /// Pool factory (poolByPair lookups)
    pub pool_factory: Address,
    /// Restaking deposit contract, where deployed
    #[serde(default)]
    pub restaking_deposit: Option<Address>,
    /// Referral code passed to pool deposits/borrows
    #[serde(default)]
    pub referral_code: u16,
}

impl Deployment {
    /// Built-in Mode mainnet deployment.
    pub fn mode_mainnet() -> Self {
        Self {
            chain_id: MODE_MAINNET,
            lending_pool: address!("794a61358D6845594F94dc1DB02A252CC533d587"),
            data_provider: address!("057835e7b4fbbb396b5c6928b391752106d2eb7b"),
            swap_router: address!("Ac48FcF1049668B285f3dC72483DF5Ae2162f7e8"),
            position_manager: address!("2e8614625226D26180aDf6530C3b1677d3D7cf10"),
            pool_factory: address!("B5F00c2C5f8821155D8ed27E31932CFD9DB3C5D5"),
            restaking_deposit: Some(address!("4D7572040B84b41a6AA2efE4A93eFFF182388F88")),
            referral_code: 0,
        }
    }

    /// Parse a deployment from TOML text.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let deployment: Deployment = toml::from_str(content)?;
        Ok(deployment)
    }

    /// Load a deployment from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }
}

/// Chain-id keyed deployment table.
#[derive(Debug, Clone, Default)]
pub struct Deployments {
    by_chain: HashMap<u64, Deployment>,
}

impl Deployments {
    /// Table with the built-in deployments.
    pub fn builtin() -> Self {
        let mut deployments = Self::default();
        deployments.insert(Deployment::mode_mainnet());
        deployments
    }

    pub fn insert(&mut self, deployment: Deployment) {
        self.by_chain.insert(deployment.chain_id, deployment);
    }

    pub fn get(&self, chain_id: u64) -> Option<&Deployment> {
        self.by_chain.get(&chain_id)
    }

    pub fn supports(&self, chain_id: u64) -> bool {
        self.by_chain.contains_key(&chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_mode_mainnet() {
        let deployments = Deployments::builtin();
        assert!(deployments.supports(MODE_MAINNET));
        assert!(!deployments.supports(1));

        let mode = deployments.get(MODE_MAINNET).unwrap();
        assert_eq!(mode.referral_code, 0);
        assert!(mode.restaking_deposit.is_some());
    }

    #[test]
    fn deployment_parses_from_toml() {
        let toml = r#"
            chain_id = 8453
            lending_pool = "0x794a61358D6845594F94dc1DB02A252CC533d587"
            data_provider = "0x057835E7B4fbbb396b5C6928B391752106d2eB7b"
            swap_router = "0xAc48FcF1049668B285f3dC72483DF5Ae2162f7e8"
            position_manager = "0x2e8614625226D26180aDf6530C3b1677d3D7cf10"
            pool_factory = "0xB5F00c2C5f8821155D8ed27E31932CFD9DB3C5D5"
        "#;
        let deployment = Deployment::from_toml_str(toml).unwrap();
        assert_eq!(deployment.chain_id, 8453);
        assert_eq!(deployment.referral_code, 0);
        assert!(deployment.restaking_deposit.is_none());
    }
}
