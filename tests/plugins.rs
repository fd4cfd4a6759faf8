//! Tool-boundary tests: plugins driven through the registry against an
//! in-memory chain that decodes calldata by selector and keeps real
//! allowance, collateral, and debt state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use agentfi::registry;
use agentfi_chain::erc20::IERC20;
use agentfi_chain::lending::{ILendingPool, IProtocolDataProvider};
use agentfi_chain::restaking::IRestakeDeposit;
use agentfi_chain::swap::ISwapRouter;
use agentfi_chain::wallet::WalletClient;
use agentfi_core::{Deployments, ToolError, ToolRegistry};

use alloy::primitives::{address, Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolValue};

const CHAIN_ID: u64 = 34443;
const ASSET: Address = address!("2222222222222222222222222222222222222222");
const VAULT_TOKEN: Address = address!("4200000000000000000000000000000000000006");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tx {
    Approve { spender: Address, amount: u64 },
    Deposit(u64),
    Withdraw(u64),
    Borrow(u64),
    Repay(u64),
    Swap { amount_in: u64 },
    Restake { amount: u64 },
}

#[derive(Default)]
struct ChainState {
    collateral: U256,
    debt: U256,
    allowances: HashMap<(Address, Address), U256>,
}

/// Wallet over an in-memory pool: decodes every transaction by selector,
/// enforces ERC20 allowances the way the real contracts do, and mutates
/// collateral/debt state.
struct MockWallet {
    address: Address,
    chain_id: u64,
    ltv_bps: u16,
    liquidation_threshold_bps: u16,
    state: Mutex<ChainState>,
    txs: Mutex<Vec<Tx>>,
    tx_counter: AtomicU64,
}

impl MockWallet {
    fn new(collateral: u64, debt: u64) -> Self {
        Self {
            address: Address::from([0x11; 20]),
            chain_id: CHAIN_ID,
            ltv_bps: 7500,
            liquidation_threshold_bps: 8000,
            state: Mutex::new(ChainState {
                collateral: U256::from(collateral),
                debt: U256::from(debt),
                allowances: HashMap::new(),
            }),
            txs: Mutex::new(Vec::new()),
            tx_counter: AtomicU64::new(1),
        }
    }

    fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    fn txs(&self) -> Vec<Tx> {
        self.txs.lock().clone()
    }

    fn consume_allowance(
        state: &mut ChainState,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<()> {
        let allowance = state.allowances.entry((token, spender)).or_default();
        if *allowance < amount {
            bail!("insufficient allowance: {allowance} < {amount}");
        }
        *allowance -= amount;
        Ok(())
    }
}

#[async_trait]
impl WalletClient for MockWallet {
    fn address(&self) -> Address {
        self.address
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes> {
        let selector: [u8; 4] = calldata[..4].try_into()?;
        let state = self.state.lock();
        match selector {
            IProtocolDataProvider::getReserveConfigurationDataCall::SELECTOR => {
                let ret = (
                    U256::from(6u64),
                    U256::from(self.ltv_bps),
                    U256::from(self.liquidation_threshold_bps),
                    U256::ZERO,
                    U256::ZERO,
                    true,
                    true,
                    false,
                    true,
                    false,
                )
                    .abi_encode_params();
                Ok(ret.into())
            }
            IProtocolDataProvider::getUserReserveDataCall::SELECTOR => {
                let ret = (
                    state.collateral,
                    U256::ZERO,
                    state.debt,
                    U256::ZERO,
                    U256::ZERO,
                    U256::ZERO,
                    U256::ZERO,
                    U256::ZERO,
                    true,
                )
                    .abi_encode_params();
                Ok(ret.into())
            }
            IERC20::allowanceCall::SELECTOR => {
                let decoded = IERC20::allowanceCall::abi_decode(&calldata, true)?;
                let allowance = state
                    .allowances
                    .get(&(to, decoded.spender))
                    .copied()
                    .unwrap_or_default();
                Ok(allowance.abi_encode().into())
            }
            IERC20::decimalsCall::SELECTOR => Ok(U256::from(18u64).abi_encode().into()),
            IRestakeDeposit::depositTokenCall::SELECTOR => Ok(VAULT_TOKEN.abi_encode().into()),
            _ => bail!("unexpected eth_call to {to} with selector {selector:02x?}"),
        }
    }

    async fn send_transaction(&self, to: Address, calldata: Bytes, _value: U256) -> Result<B256> {
        let selector: [u8; 4] = calldata[..4].try_into()?;
        let mut state = self.state.lock();
        let tx = match selector {
            IERC20::approveCall::SELECTOR => {
                let decoded = IERC20::approveCall::abi_decode(&calldata, true)?;
                state.allowances.insert((to, decoded.spender), decoded.amount);
                Tx::Approve {
                    spender: decoded.spender,
                    amount: decoded.amount.to::<u64>(),
                }
            }
            ILendingPool::depositCall::SELECTOR => {
                let decoded = ILendingPool::depositCall::abi_decode(&calldata, true)?;
                Self::consume_allowance(&mut state, decoded.asset, to, decoded.amount)?;
                state.collateral += decoded.amount;
                Tx::Deposit(decoded.amount.to::<u64>())
            }
            ILendingPool::withdrawCall::SELECTOR => {
                let decoded = ILendingPool::withdrawCall::abi_decode(&calldata, true)?;
                state.collateral = state.collateral.saturating_sub(decoded.amount);
                Tx::Withdraw(decoded.amount.to::<u64>())
            }
            ILendingPool::borrowCall::SELECTOR => {
                let decoded = ILendingPool::borrowCall::abi_decode(&calldata, true)?;
                state.debt += decoded.amount;
                Tx::Borrow(decoded.amount.to::<u64>())
            }
            ILendingPool::repayCall::SELECTOR => {
                let decoded = ILendingPool::repayCall::abi_decode(&calldata, true)?;
                Self::consume_allowance(&mut state, decoded.asset, to, decoded.amount)?;
                state.debt = state.debt.saturating_sub(decoded.amount);
                Tx::Repay(decoded.amount.to::<u64>())
            }
            ISwapRouter::exactInputSingleCall::SELECTOR => {
                let decoded = ISwapRouter::exactInputSingleCall::abi_decode(&calldata, true)?;
                Self::consume_allowance(
                    &mut state,
                    decoded.params.tokenIn,
                    to,
                    decoded.params.amountIn,
                )?;
                Tx::Swap {
                    amount_in: decoded.params.amountIn.to::<u64>(),
                }
            }
            IRestakeDeposit::depositCall::SELECTOR => {
                let decoded = IRestakeDeposit::depositCall::abi_decode(&calldata, true)?;
                Self::consume_allowance(&mut state, VAULT_TOKEN, to, decoded.amountIn)?;
                Tx::Restake {
                    amount: decoded.amountIn.to::<u64>(),
                }
            }
            _ => bail!("unexpected transaction to {to} with selector {selector:02x?}"),
        };
        self.txs.lock().push(tx);
        Ok(B256::from(U256::from(
            self.tx_counter.fetch_add(1, Ordering::SeqCst),
        )))
    }
}

fn registry_over(wallet: &Arc<MockWallet>) -> ToolRegistry {
    registry(wallet.clone(), Deployments::builtin())
}

#[tokio::test]
async fn loop_deposit_records_borrows_through_the_registry() {
    let wallet = Arc::new(MockWallet::new(0, 0));
    let registry = registry_over(&wallet);

    let result = registry
        .execute(
            "loop_deposit",
            &json!({
                "asset": format!("{ASSET:?}"),
                "initial_amount": "1000",
                "num_loops": 2,
            }),
        )
        .await
        .unwrap();

    assert_eq!(result["borrowed_amounts"], json!(["750", "562"]));
    assert_eq!(result["total_borrowed"], "1312");
    assert_eq!(result["total_deposited"], "2312");

    let state = wallet.state.lock();
    assert_eq!(state.collateral, U256::from(2312u64));
    assert_eq!(state.debt, U256::from(1312u64));
}

#[tokio::test]
async fn loop_deposit_approves_before_every_pool_pull() {
    let wallet = Arc::new(MockWallet::new(0, 0));
    let registry = registry_over(&wallet);

    registry
        .execute(
            "loop_deposit",
            &json!({
                "asset": format!("{ASSET:?}"),
                "initial_amount": "1000",
                "num_loops": 1,
            }),
        )
        .await
        .unwrap();

    let deposits: Vec<_> = wallet
        .txs()
        .into_iter()
        .filter(|tx| !matches!(tx, Tx::Approve { .. }))
        .collect();
    assert_eq!(
        deposits,
        vec![Tx::Deposit(1000), Tx::Borrow(750), Tx::Deposit(750)]
    );
    // Every pull got an exact approval, so nothing is left over.
    let state = wallet.state.lock();
    assert!(state.allowances.values().all(|a| a.is_zero()));
}

#[tokio::test]
async fn loop_withdraw_clears_debt_then_collateral() {
    let wallet = Arc::new(MockWallet::new(1000, 750));
    let registry = registry_over(&wallet);

    let result = registry
        .execute("loop_withdraw", &json!({ "asset": format!("{ASSET:?}") }))
        .await
        .unwrap();

    assert_eq!(result["total_repaid"], "750");
    assert!(result["iterations"].as_u64().unwrap() >= 1);

    let state = wallet.state.lock();
    assert_eq!(state.debt, U256::ZERO);
    assert_eq!(state.collateral, U256::ZERO);
}

#[tokio::test]
async fn loop_withdraw_replays_a_recorded_position() {
    let wallet = Arc::new(MockWallet::new(2312, 1312));
    let registry = registry_over(&wallet);

    let result = registry
        .execute(
            "loop_withdraw",
            &json!({
                "asset": format!("{ASSET:?}"),
                "position": {
                    "borrowed_amounts": ["750", "562"],
                    "total_deposited": "2312",
                    "total_borrowed": "1312",
                },
            }),
        )
        .await
        .unwrap();

    assert_eq!(result["iterations"], 2);
    assert_eq!(result["total_repaid"], "1312");

    let withdraws: Vec<_> = wallet
        .txs()
        .into_iter()
        .filter(|tx| matches!(tx, Tx::Withdraw(_)))
        .collect();
    assert_eq!(
        withdraws,
        vec![Tx::Withdraw(562), Tx::Withdraw(750), Tx::Withdraw(2312)]
    );
}

#[tokio::test]
async fn loop_withdraw_refuses_to_breach_health_factor() {
    // 800 debt against 1000 collateral at the 80% threshold: no headroom.
    let wallet = Arc::new(MockWallet::new(1000, 800));
    let registry = registry_over(&wallet);

    let err = registry
        .execute("loop_withdraw", &json!({ "asset": format!("{ASSET:?}") }))
        .await;
    assert!(matches!(err, Err(ToolError::HealthFactorBreach)));
    assert!(wallet.txs().is_empty());
}

#[tokio::test]
async fn monitor_reports_infinite_health_without_debt() {
    let wallet = Arc::new(MockWallet::new(500, 0));
    let registry = registry_over(&wallet);

    let result = registry
        .execute("monitor_position", &json!({ "asset": format!("{ASSET:?}") }))
        .await
        .unwrap();

    assert_eq!(result["collateral"], "500");
    assert_eq!(result["variable_debt"], "0");
    assert_eq!(result["current_ltv_bps"], 0);
    assert_eq!(result["health_factor"], "infinite");
    assert_eq!(result["liquidation_threshold_bps"], 8000);
}

#[tokio::test]
async fn swap_approves_the_exact_input_before_the_router_call() {
    let wallet = Arc::new(MockWallet::new(0, 0));
    let registry = registry_over(&wallet);

    let result = registry
        .execute(
            "swap_exact_input_single",
            &json!({
                "token_in": format!("{ASSET:?}"),
                "token_out": format!("{VAULT_TOKEN:?}"),
                "amount_in": "1000",
                "amount_out_minimum": "990",
            }),
        )
        .await
        .unwrap();
    assert!(result["tx"].is_string());

    let router = Deployments::builtin().get(CHAIN_ID).unwrap().swap_router;
    let txs = wallet.txs();
    assert_eq!(
        txs[0],
        Tx::Approve {
            spender: router,
            amount: 1000
        }
    );
    assert_eq!(txs[1], Tx::Swap { amount_in: 1000 });
}

#[tokio::test]
async fn restake_deposit_rejects_a_token_the_vault_does_not_accept() {
    let wallet = Arc::new(MockWallet::new(0, 0));
    let registry = registry_over(&wallet);

    let err = registry
        .execute(
            "restake_deposit",
            &json!({
                "token": format!("{ASSET:?}"),
                "amount": "1000",
                "min_out": "990",
            }),
        )
        .await;
    assert!(matches!(
        err,
        Err(ToolError::InvalidParameter { field: "token", .. })
    ));
    assert!(wallet.txs().is_empty());
}

#[tokio::test]
async fn restake_deposit_verifies_then_deposits() {
    let wallet = Arc::new(MockWallet::new(0, 0));
    let registry = registry_over(&wallet);

    registry
        .execute(
            "restake_deposit",
            &json!({
                "token": format!("{VAULT_TOKEN:?}"),
                "amount": "1000",
                "min_out": "990",
            }),
        )
        .await
        .unwrap();

    let txs = wallet.txs();
    assert!(matches!(txs[0], Tx::Approve { amount: 1000, .. }));
    assert_eq!(txs[1], Tx::Restake { amount: 1000 });
}

#[tokio::test]
async fn token_info_resolves_known_tokens_without_the_network() {
    let wallet = Arc::new(MockWallet::new(0, 0));
    let registry = registry_over(&wallet);

    let result = registry
        .execute("get_token_info", &json!({ "symbol": "usdc" }))
        .await
        .unwrap();
    assert_eq!(result["symbol"], "USDC");
    assert_eq!(result["decimals"], 6);
    let address = result["contract_address"].as_str().unwrap();
    assert!(address.eq_ignore_ascii_case("0xd988097fb8612cc24eec14542bc03424c656005f"));
}

#[tokio::test]
async fn malformed_parameters_never_touch_the_chain() {
    let wallet = Arc::new(MockWallet::new(0, 0));
    let registry = registry_over(&wallet);

    let err = registry
        .execute(
            "loop_deposit",
            &json!({ "asset": "not-an-address", "initial_amount": "1000", "num_loops": 2 }),
        )
        .await;
    assert!(matches!(err, Err(ToolError::InvalidParameter { .. })));

    let err = registry
        .execute(
            "loop_deposit",
            &json!({ "asset": format!("{ASSET:?}"), "initial_amount": "1000", "num_loops": 6 }),
        )
        .await;
    assert!(matches!(
        err,
        Err(ToolError::InvalidParameter {
            field: "num_loops",
            ..
        })
    ));

    assert!(wallet.txs().is_empty());
}

#[tokio::test]
async fn unsupported_chain_is_a_typed_error() {
    let wallet = Arc::new(MockWallet::new(0, 0).with_chain_id(999));
    let registry = registry_over(&wallet);

    let err = registry
        .execute(
            "loop_deposit",
            &json!({ "asset": format!("{ASSET:?}"), "initial_amount": "1000", "num_loops": 1 }),
        )
        .await;
    assert!(matches!(
        err,
        Err(ToolError::UnsupportedChain { chain_id: 999, .. })
    ));
}

#[tokio::test]
async fn unknown_tool_is_a_typed_error() {
    let wallet = Arc::new(MockWallet::new(0, 0));
    let registry = registry_over(&wallet);

    let err = registry.execute("no_such_tool", &json!({})).await;
    assert!(matches!(err, Err(ToolError::UnknownTool(name)) if name == "no_such_tool"));
}
