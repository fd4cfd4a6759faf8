//! Integer arithmetic for position math and tool-boundary amounts.
//!
//! All ratio math is basis-point arithmetic on U256 with truncating division;
//! floating point never touches an amount. Tool-boundary amounts are base-unit
//! decimal strings, parsed and formatted here.

use alloy::primitives::U256;

use crate::error::ToolError;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: U256 = U256::from_limbs([10000u64, 0, 0, 0]);

/// Pre-computed powers of 10 for fast decimal conversion
const POW10: [u128; 39] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
    10_000_000_000_000_000_000,
    100_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000_000_000_000,
    1_000_000_000_000_000_000_000_000_000_000_000_000,
    10_000_000_000_000_000_000_000_000_000_000_000_000,
    100_000_000_000_000_000_000_000_000_000_000_000_000,
];

/// Fast power of 10 lookup (up to 10^38)
#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    if exp < 39 {
        U256::from(POW10[exp as usize])
    } else {
        U256::from(10u64).pow(U256::from(exp))
    }
}

/// Apply a basis points fraction: value * bps / 10000, truncating.
///
/// Example: bps_of(1000, 7500) = 750
#[inline(always)]
pub fn bps_of(value: U256, bps: u16) -> U256 {
    (value * U256::from(bps)) / BPS_DENOMINATOR
}

/// Apply basis points reduction (e.g., for a withdrawal margin).
/// Returns: value * (10000 - basis_points) / 10000
///
/// Example: apply_basis_points(1000, 50) = 995 (0.5% reduction)
#[inline(always)]
pub fn apply_basis_points(value: U256, basis_points: u16) -> U256 {
    let factor = U256::from(10000u16.saturating_sub(basis_points));
    (value * factor) / BPS_DENOMINATOR
}

/// Health factor in WAD: (collateral * liquidation_threshold_bps * 1e18) /
/// (debt * 10000). Returns U256::MAX if debt is zero; callers map that to the
/// infinite sentinel.
#[inline(always)]
pub fn health_factor_wad(collateral: U256, debt: U256, liquidation_threshold_bps: u16) -> U256 {
    if debt.is_zero() {
        return U256::MAX;
    }
    (collateral * U256::from(liquidation_threshold_bps) * WAD) / (debt * BPS_DENOMINATOR)
}

/// Safe minimum of two U256 values
#[inline(always)]
pub fn min(a: U256, b: U256) -> U256 {
    if a < b {
        a
    } else {
        b
    }
}

/// Parse a base-unit amount from its tool-boundary form: a non-empty decimal
/// integer string with no sign, separators, or fractional part.
pub fn parse_base_units(field: &'static str, value: &str) -> Result<U256, ToolError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ToolError::InvalidParameter {
            field,
            reason: format!("`{value}` is not a base-unit decimal integer"),
        });
    }
    U256::from_str_radix(value, 10).map_err(|_| ToolError::InvalidParameter {
        field,
        reason: format!("`{value}` exceeds uint256"),
    })
}

/// Format a base-unit amount as a human-readable decimal string
/// (display only; amounts never round-trip through this form).
pub fn format_units(amount: U256, decimals: u8) -> String {
    let scale = pow10(decimals);
    let whole = amount / scale;
    let frac = amount % scale;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac_str = format!("{:0>width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}
