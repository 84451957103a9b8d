//! Idealised per-side trading costs.
//!
//! Fees and slippage are charged in basis points on the notional of each
//! side: once on entry (size 1.0) and once per exit leg. Costs are expressed
//! as fractions of the entry notional so they subtract directly from the
//! trade's gross PnL percentage.

use serde::{Deserialize, Serialize};

use crate::domain::{CostBreakdown, ExitFill};
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Commission in basis points per side.
    #[serde(default)]
    pub fee_bps: f64,
    /// Idealised slippage in basis points per side.
    #[serde(default)]
    pub slippage_bps: f64,
}

impl FeeConfig {
    pub fn new(fee_bps: f64, slippage_bps: f64) -> Self {
        Self {
            fee_bps,
            slippage_bps,
        }
    }

    pub fn frictionless() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("fee_bps", self.fee_bps), ("slippage_bps", self.slippage_bps)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::param(
                    "fees",
                    format!("{name} must be a non-negative number, got {value}"),
                ));
            }
        }
        Ok(())
    }

    /// Cost of a round trip: entry at `entry_price` for the full size, then
    /// every exit leg at its own price and size.
    pub fn round_trip(&self, entry_price: f64, exits: &[ExitFill]) -> CostBreakdown {
        let exit_notional: f64 = exits.iter().map(|e| e.size * e.price / entry_price).sum();
        let notional = 1.0 + exit_notional;
        CostBreakdown {
            fees: notional * self.fee_bps / 10_000.0,
            slippage: notional * self.slippage_bps / 10_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventReason, Timestamp};

    fn leg(price: f64, size: f64) -> ExitFill {
        ExitFill {
            candle_index: 1,
            timestamp: Timestamp::from_secs(60),
            price,
            size,
            reason: EventReason::Target,
        }
    }

    #[test]
    fn frictionless_is_zero() {
        let costs = FeeConfig::frictionless().round_trip(1.0, &[leg(1.1, 1.0)]);
        assert_eq!(costs.total(), 0.0);
    }

    #[test]
    fn round_trip_charges_both_sides() {
        // entry notional 1.0, exit notional 1.1 → 2.1 * 10bps
        let costs = FeeConfig::new(10.0, 5.0).round_trip(1.0, &[leg(1.1, 1.0)]);
        assert!((costs.fees - 2.1 * 0.001).abs() < 1e-12);
        assert!((costs.slippage - 2.1 * 0.0005).abs() < 1e-12);
    }

    #[test]
    fn partial_legs_weighted_by_size() {
        let costs = FeeConfig::new(10.0, 0.0).round_trip(2.0, &[leg(2.2, 0.5), leg(1.8, 0.5)]);
        // exit notional = 0.5*1.1 + 0.5*0.9 = 1.0
        assert!((costs.fees - 2.0 * 0.001).abs() < 1e-12);
    }

    #[test]
    fn negative_fee_rejected() {
        assert!(FeeConfig::new(-1.0, 0.0).validate().is_err());
        assert!(FeeConfig::new(0.0, f64::NAN).validate().is_err());
        assert!(FeeConfig::new(10.0, 5.0).validate().is_ok());
    }
}
