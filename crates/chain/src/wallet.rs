//! Wallet abstraction over signing, sending, and read-only calls.
//!
//! The `WalletClient` trait is the only seam the contract wrappers see, so the
//! whole chain layer can run against an in-memory wallet in tests. `EvmWallet`
//! is the production implementation: cached nonce (resynced on failure) and a
//! configurable gas model, adapted for general tool transactions rather than
//! latency-critical paths.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Read/write access to the chain on behalf of one signer.
///
/// `send_transaction` submits and awaits inclusion; a reverted receipt is an
/// error. Implementations do not retry.
#[async_trait]
pub trait WalletClient: Send + Sync {
    /// The signer address.
    fn address(&self) -> Address;

    /// Chain this wallet is connected to.
    fn chain_id(&self) -> u64;

    /// Read-only `eth_call` against `to`.
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes>;

    /// Sign, submit, and wait for the receipt. Returns the transaction hash
    /// on success; reverted transactions are errors.
    async fn send_transaction(&self, to: Address, calldata: Bytes, value: U256) -> Result<B256>;
}

/// Gas pricing for outgoing transactions.
#[derive(Debug, Clone, Copy)]
pub enum GasSettings {
    Legacy {
        gas_price: u128,
    },
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl GasSettings {
    fn apply(&self, tx: &mut TransactionRequest) {
        match *self {
            GasSettings::Legacy { gas_price } => {
                tx.set_gas_price(gas_price);
            }
            GasSettings::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                tx.set_max_fee_per_gas(max_fee_per_gas);
                tx.set_max_priority_fee_per_gas(max_priority_fee_per_gas);
            }
        }
    }
}

impl Default for GasSettings {
    fn default() -> Self {
        // 1 gwei legacy; callers on EIP-1559 chains override via `with_gas`.
        GasSettings::Legacy {
            gas_price: 1_000_000_000,
        }
    }
}

/// Cached nonce manager. Tracks the next nonce locally with atomic
/// operations, avoiding an RPC round trip per transaction.
pub struct NonceManager {
    current: AtomicU64,
}

impl NonceManager {
    pub fn new(initial_nonce: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_nonce),
        }
    }

    /// Get next nonce and increment counter.
    #[inline]
    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst)
    }

    /// Get current nonce without incrementing.
    #[inline]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Reset nonce to chain value (use after tx failure).
    pub fn reset(&self, chain_nonce: u64) {
        self.current.store(chain_nonce, Ordering::SeqCst);
    }
}

/// Default gas limit for tool transactions. Deposit-with-borrow loops and
/// position-manager mints stay well under this.
const DEFAULT_GAS_LIMIT: u64 = 1_600_000;

/// Alloy-backed wallet: local key, cached nonce, fixed gas model.
pub struct EvmWallet {
    rpc_url: String,
    wallet: EthereumWallet,
    address: Address,
    chain_id: u64,
    nonce_manager: NonceManager,
    gas: parking_lot::RwLock<GasSettings>,
    gas_limit: u64,
}

impl EvmWallet {
    /// Connect with a private key (with or without 0x prefix). Fetches the
    /// chain id and initial nonce from the RPC.
    pub async fn connect(private_key: &str, rpc_url: &str) -> Result<Self> {
        let key_str = private_key.trim_start_matches("0x");
        let signer: PrivateKeySigner = key_str.parse().context("invalid private key")?;
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new().on_http(rpc_url.parse()?);
        let chain_id = provider.get_chain_id().await?;
        let initial_nonce = provider.get_transaction_count(address).await?;

        info!(
            address = %address,
            chain_id = chain_id,
            initial_nonce = initial_nonce,
            "Wallet connected"
        );

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            wallet,
            address,
            chain_id,
            nonce_manager: NonceManager::new(initial_nonce),
            gas: parking_lot::RwLock::new(GasSettings::default()),
            gas_limit: DEFAULT_GAS_LIMIT,
        })
    }

    /// Override the gas settings.
    pub fn with_gas(self, gas: GasSettings) -> Self {
        *self.gas.write() = gas;
        self
    }

    /// Override the per-transaction gas limit.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Current cached nonce.
    pub fn current_nonce(&self) -> u64 {
        self.nonce_manager.current()
    }

    /// Native balance of the signer.
    pub async fn balance(&self) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let balance = provider.get_balance(self.address).await?;
        Ok(balance)
    }

    /// Resync the cached nonce from the chain (call after a failed send).
    async fn sync_nonce(&self) {
        let provider = match self.rpc_url.parse() {
            Ok(url) => ProviderBuilder::new().on_http(url),
            Err(e) => {
                warn!(error = %e, "Invalid RPC URL while syncing nonce");
                return;
            }
        };
        match provider.get_transaction_count(self.address).await {
            Ok(chain_nonce) => {
                self.nonce_manager.reset(chain_nonce);
                debug!(nonce = chain_nonce, "Nonce synced from chain");
            }
            Err(e) => {
                warn!(error = %e, "Failed to sync nonce from chain");
            }
        }
    }
}

#[async_trait]
impl WalletClient for EvmWallet {
    fn address(&self) -> Address {
        self.address
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let tx = TransactionRequest::default()
            .with_to(to)
            .with_input(calldata);
        let data = provider
            .call(tx)
            .await
            .with_context(|| format!("eth_call to {to} failed"))?;
        Ok(data)
    }

    async fn send_transaction(&self, to: Address, calldata: Bytes, value: U256) -> Result<B256> {
        let start = Instant::now();
        let nonce = self.nonce_manager.next();

        let mut tx = TransactionRequest::default()
            .with_to(to)
            .with_input(calldata)
            .with_value(value)
            .with_nonce(nonce)
            .with_gas_limit(self.gas_limit)
            .with_chain_id(self.chain_id);
        self.gas.read().apply(&mut tx);

        debug!(to = %to, nonce = nonce, value = %value, "Sending transaction");

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.rpc_url.parse()?);

        let pending = match provider.send_transaction(tx).await {
            Ok(pending) => pending,
            Err(e) => {
                self.sync_nonce().await;
                return Err(anyhow::Error::from(e).context("transaction submission failed"));
            }
        };
        let tx_hash = *pending.tx_hash();

        let receipt = pending
            .get_receipt()
            .await
            .context("failed awaiting receipt")?;

        if receipt.status() {
            info!(
                tx_hash = %tx_hash,
                block = receipt.block_number.unwrap_or(0),
                gas_used = receipt.gas_used,
                total_ms = start.elapsed().as_millis(),
                "Transaction confirmed"
            );
            Ok(tx_hash)
        } else {
            warn!(tx_hash = %tx_hash, "Transaction reverted, syncing nonce");
            self.sync_nonce().await;
            anyhow::bail!("transaction reverted: {tx_hash:?}")
        }
    }
}

impl std::fmt::Debug for EvmWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmWallet")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_manager_increments_and_resets() {
        let manager = NonceManager::new(10);

        assert_eq!(manager.current(), 10);
        assert_eq!(manager.next(), 10);
        assert_eq!(manager.current(), 11);
        assert_eq!(manager.next(), 11);
        assert_eq!(manager.current(), 12);

        manager.reset(5);
        assert_eq!(manager.current(), 5);
    }

    #[test]
    fn gas_settings_apply() {
        let mut tx = TransactionRequest::default();
        GasSettings::Legacy {
            gas_price: 2_000_000_000,
        }
        .apply(&mut tx);
        assert_eq!(tx.gas_price, Some(2_000_000_000));

        let mut tx = TransactionRequest::default();
        GasSettings::Eip1559 {
            max_fee_per_gas: 3_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        }
        .apply(&mut tx);
        assert_eq!(tx.max_fee_per_gas, Some(3_000_000_000));
        assert_eq!(tx.max_priority_fee_per_gas, Some(1_000_000_000));
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn wallet_connects() {
        // Test private key (DO NOT USE IN PRODUCTION)
        let private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let wallet = EvmWallet::connect(private_key, "https://mainnet.mode.network").await;

        assert!(wallet.is_ok());
        let wallet = wallet.unwrap();
        assert_eq!(
            format!("{:?}", wallet.address()).to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        assert_eq!(wallet.chain_id(), 34443);
    }
}
