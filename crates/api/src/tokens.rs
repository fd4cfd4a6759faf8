//! Built-in table of well-known tokens, checked before any network lookup.

use alloy::primitives::{address, Address};

/// Resolved token metadata. `decimals` is `None` until read on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub symbol: String,
    pub name: String,
    pub address: Address,
    pub decimals: Option<u8>,
}

struct KnownToken {
    symbol: &'static str,
    name: &'static str,
    decimals: u8,
    chains: &'static [(u64, Address)],
}

static KNOWN_TOKENS: &[KnownToken] = &[
    KnownToken {
        symbol: "WETH",
        name: "Wrapped Ether",
        decimals: 18,
        chains: &[
            (1, address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")),
            (10, address!("4200000000000000000000000000000000000006")),
            (8453, address!("4200000000000000000000000000000000000006")),
            (34443, address!("4200000000000000000000000000000000000006")),
        ],
    },
    KnownToken {
        symbol: "USDC",
        name: "USD Coin",
        decimals: 6,
        chains: &[
            (1, address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")),
            (10, address!("0b2C639c533813f4Aa9D7837CAf62653d097Ff85")),
            (8453, address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913")),
            (34443, address!("d988097fb8612cc24eeC14542bC03424c656005f")),
        ],
    },
    KnownToken {
        symbol: "USDT",
        name: "Tether USD",
        decimals: 6,
        chains: &[
            (1, address!("dAC17F958D2ee523a2206206994597C13D831ec7")),
            (34443, address!("f0F161fDA2712DB8b566946122a5af183995e2eD")),
        ],
    },
    KnownToken {
        symbol: "IUSD",
        name: "Ironclad USD",
        decimals: 6,
        chains: &[(34443, address!("e7334Ad0e325139329E747cF2Fc24538dD564987"))],
    },
];

/// Look up a symbol in the built-in table. Case-insensitive on symbol;
/// returns `None` when the token exists but has no deployment on `chain_id`.
pub fn known_token(symbol: &str, chain_id: u64) -> Option<TokenMetadata> {
    let token = KNOWN_TOKENS
        .iter()
        .find(|t| t.symbol.eq_ignore_ascii_case(symbol))?;
    let (_, address) = token.chains.iter().find(|(id, _)| *id == chain_id)?;
    Some(TokenMetadata {
        symbol: token.symbol.to_string(),
        name: token.name.to_string(),
        address: *address,
        decimals: Some(token.decimals),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let usdc = known_token("usdc", 34443).unwrap();
        assert_eq!(usdc.symbol, "USDC");
        assert_eq!(usdc.decimals, Some(6));
    }

    #[test]
    fn unknown_chain_returns_none() {
        assert!(known_token("USDT", 8453).is_none());
        assert!(known_token("NOPE", 1).is_none());
    }
}
