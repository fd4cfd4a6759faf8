//! Loop position accounting and position monitor math.
//!
//! `LoopPosition` records what a loop deposit did: per-iteration borrow
//! amounts in chronological order plus running totals. The monitor functions
//! are pure math over a reserve snapshot; the withdraw engine never consults
//! them (it re-derives everything from fresh reads).

use alloy::primitives::U256;
use serde_json::{json, Value};
use smallvec::SmallVec;

use crate::error::ToolError;
use crate::math::{self, parse_base_units, BPS_DENOMINATOR};

/// Outcome of a loop deposit. `borrowed_amounts` is in chronological loop
/// order; totals satisfy `total_deposited = initial + sum(borrowed_amounts)`
/// and `total_borrowed = sum(borrowed_amounts)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopPosition {
    pub borrowed_amounts: SmallVec<[U256; 5]>,
    pub total_deposited: U256,
    pub total_borrowed: U256,
}

impl LoopPosition {
    /// Position right after the initial deposit, before any loop iteration.
    pub fn opened_with(initial_amount: U256) -> Self {
        Self {
            borrowed_amounts: SmallVec::new(),
            total_deposited: initial_amount,
            total_borrowed: U256::ZERO,
        }
    }

    /// Record one loop iteration: the borrow was re-deposited, so it counts
    /// toward both totals.
    pub fn record_borrow(&mut self, amount: U256) {
        self.borrowed_amounts.push(amount);
        self.total_borrowed += amount;
        self.total_deposited += amount;
    }

    /// Tool-boundary form: base-unit decimal strings.
    pub fn to_json(&self) -> Value {
        json!({
            "borrowed_amounts": self.borrowed_amounts.iter().map(|a| a.to_string()).collect::<Vec<_>>(),
            "total_deposited": self.total_deposited.to_string(),
            "total_borrowed": self.total_borrowed.to_string(),
        })
    }

    /// Parse the tool-boundary form back into a position.
    pub fn from_json(value: &Value) -> Result<Self, ToolError> {
        let amounts = value
            .get("borrowed_amounts")
            .and_then(Value::as_array)
            .ok_or_else(|| ToolError::InvalidParameter {
                field: "position.borrowed_amounts",
                reason: "missing or not an array".to_string(),
            })?;
        let mut borrowed_amounts = SmallVec::new();
        for amount in amounts {
            let s = amount.as_str().ok_or_else(|| ToolError::InvalidParameter {
                field: "position.borrowed_amounts",
                reason: "amounts must be base-unit decimal strings".to_string(),
            })?;
            borrowed_amounts.push(parse_base_units("position.borrowed_amounts", s)?);
        }

        let total_deposited = value
            .get("total_deposited")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParameter {
                field: "position.total_deposited",
                reason: "missing or not a string".to_string(),
            })?;
        let total_borrowed = value
            .get("total_borrowed")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParameter {
                field: "position.total_borrowed",
                reason: "missing or not a string".to_string(),
            })?;

        Ok(Self {
            borrowed_amounts,
            total_deposited: parse_base_units("position.total_deposited", total_deposited)?,
            total_borrowed: parse_base_units("position.total_borrowed", total_borrowed)?,
        })
    }
}

/// Health factor of a position. Zero debt has no liquidation price, so it is
/// a distinct sentinel rather than a large number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthFactor {
    Infinite,
    /// WAD-scaled (1e18 = 1.0).
    Finite(U256),
}

impl HealthFactor {
    fn to_json(self) -> Value {
        match self {
            HealthFactor::Infinite => json!("infinite"),
            HealthFactor::Finite(wad) => json!(wad.to_string()),
        }
    }
}

/// Snapshot assessment of one user's reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionHealth {
    pub collateral: U256,
    pub variable_debt: U256,
    /// debt / collateral in basis points, truncating; 0 when there is no debt.
    pub current_ltv_bps: u32,
    pub health_factor: HealthFactor,
}

impl PositionHealth {
    /// Pure assessment of a (collateral, debt) snapshot against a reserve's
    /// liquidation threshold.
    pub fn assess(collateral: U256, variable_debt: U256, liquidation_threshold_bps: u16) -> Self {
        let (current_ltv_bps, health_factor) = if variable_debt.is_zero() {
            (0u32, HealthFactor::Infinite)
        } else if collateral.is_zero() {
            (u32::MAX, HealthFactor::Finite(U256::ZERO))
        } else {
            let ltv = (variable_debt * BPS_DENOMINATOR) / collateral;
            let ltv = ltv.min(U256::from(u32::MAX)).to::<u32>();
            let hf = math::health_factor_wad(collateral, variable_debt, liquidation_threshold_bps);
            (ltv, HealthFactor::Finite(hf))
        };
        Self {
            collateral,
            variable_debt,
            current_ltv_bps,
            health_factor,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "collateral": self.collateral.to_string(),
            "variable_debt": self.variable_debt.to_string(),
            "current_ltv_bps": self.current_ltv_bps,
            "health_factor": self.health_factor.to_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::WAD;

    #[test]
    fn position_accounting_identities() {
        let mut position = LoopPosition::opened_with(U256::from(1000u64));
        position.record_borrow(U256::from(750u64));
        position.record_borrow(U256::from(562u64));

        assert_eq!(
            position.borrowed_amounts.as_slice(),
            &[U256::from(750u64), U256::from(562u64)]
        );
        assert_eq!(position.total_borrowed, U256::from(1312u64));
        assert_eq!(position.total_deposited, U256::from(2312u64));
    }

    #[test]
    fn position_json_roundtrip() {
        let mut position = LoopPosition::opened_with(U256::from(1000u64));
        position.record_borrow(U256::from(750u64));

        let value = position.to_json();
        assert_eq!(value["total_deposited"], "1750");
        assert_eq!(value["borrowed_amounts"][0], "750");

        let parsed = LoopPosition::from_json(&value).unwrap();
        assert_eq!(parsed, position);
    }

    #[test]
    fn position_json_rejects_bad_amounts() {
        let value = json!({
            "borrowed_amounts": ["75x"],
            "total_deposited": "1750",
            "total_borrowed": "750",
        });
        assert!(LoopPosition::from_json(&value).is_err());
    }

    #[test]
    fn zero_debt_is_infinite_health() {
        let health = PositionHealth::assess(U256::from(1000u64), U256::ZERO, 8000);
        assert_eq!(health.current_ltv_bps, 0);
        assert_eq!(health.health_factor, HealthFactor::Infinite);
        assert_eq!(health.to_json()["health_factor"], "infinite");
    }

    #[test]
    fn ltv_and_health_factor_from_snapshot() {
        // 750 debt against 1000 collateral at 80% threshold
        let health = PositionHealth::assess(U256::from(1000u64), U256::from(750u64), 8000);
        assert_eq!(health.current_ltv_bps, 7500);
        let expected_hf = (U256::from(800u64) * WAD) / U256::from(750u64);
        assert_eq!(health.health_factor, HealthFactor::Finite(expected_hf));
    }

    #[test]
    fn debt_without_collateral() {
        let health = PositionHealth::assess(U256::ZERO, U256::from(10u64), 8000);
        assert_eq!(health.health_factor, HealthFactor::Finite(U256::ZERO));
        assert_eq!(health.current_ltv_bps, u32::MAX);
    }
}
