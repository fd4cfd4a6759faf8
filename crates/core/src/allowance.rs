//! Allowance management: exact-amount approvals, issued only when the current
//! allowance is insufficient.

use agentfi_chain::erc20::TokenOps;
use alloy::primitives::{Address, B256, U256};
use tracing::debug;

use crate::error::ToolError;

/// Ensure `spender` may move `required` of `token` from `owner`.
///
/// Returns `Ok(None)` when the existing allowance already covers the amount
/// (no transaction sent), `Ok(Some(tx_hash))` after a confirmed approval for
/// exactly `required`. An approval failure aborts the caller's flow; there is
/// no retry and no unlimited-approval fallback.
pub async fn ensure_allowance(
    tokens: &dyn TokenOps,
    token: Address,
    owner: Address,
    spender: Address,
    required: U256,
) -> Result<Option<B256>, ToolError> {
    let current = tokens.allowance(token, owner, spender).await?;
    if current >= required {
        debug!(token = %token, spender = %spender, allowance = %current, required = %required, "Allowance sufficient");
        return Ok(None);
    }
    let tx_hash = tokens.approve(token, spender, required).await?;
    Ok(Some(tx_hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct MockTokens {
        allowance: Mutex<U256>,
        approvals: Mutex<Vec<U256>>,
    }

    impl MockTokens {
        fn with_allowance(allowance: U256) -> Self {
            Self {
                allowance: Mutex::new(allowance),
                approvals: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TokenOps for MockTokens {
        async fn decimals(&self, _token: Address) -> Result<u8> {
            Ok(18)
        }
        async fn symbol(&self, _token: Address) -> Result<String> {
            Ok("MOCK".to_string())
        }
        async fn balance_of(&self, _token: Address, _owner: Address) -> Result<U256> {
            Ok(U256::ZERO)
        }
        async fn allowance(
            &self,
            _token: Address,
            _owner: Address,
            _spender: Address,
        ) -> Result<U256> {
            Ok(*self.allowance.lock())
        }
        async fn approve(&self, _token: Address, _spender: Address, amount: U256) -> Result<B256> {
            *self.allowance.lock() = amount;
            self.approvals.lock().push(amount);
            Ok(B256::ZERO)
        }
    }

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    #[tokio::test]
    async fn sufficient_allowance_is_a_noop() {
        let tokens = MockTokens::with_allowance(U256::from(1000u64));
        let result = ensure_allowance(&tokens, addr(1), addr(2), addr(3), U256::from(500u64))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(tokens.approvals.lock().is_empty());
    }

    #[tokio::test]
    async fn insufficient_allowance_approves_exact_amount() {
        let tokens = MockTokens::with_allowance(U256::from(100u64));
        let result = ensure_allowance(&tokens, addr(1), addr(2), addr(3), U256::from(500u64))
            .await
            .unwrap();
        assert!(result.is_some());
        assert_eq!(tokens.approvals.lock().as_slice(), &[U256::from(500u64)]);
    }

    #[tokio::test]
    async fn equal_allowance_is_sufficient() {
        let tokens = MockTokens::with_allowance(U256::from(500u64));
        let result = ensure_allowance(&tokens, addr(1), addr(2), addr(3), U256::from(500u64))
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
