//! Live-trade records: observed executions used for calibration.

use serde::{Deserialize, Serialize};

use crate::domain::Timestamp;
use crate::execution::Side;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveTradeRecord {
    pub venue: String,
    pub side: Side,
    /// Trade notional.
    pub size: f64,
    pub expected_price: f64,
    /// `None` when the trade failed.
    #[serde(default)]
    pub actual_price: Option<f64>,
    pub submitted_at: Timestamp,
    /// End of the network leg (transaction landed).
    pub landed_at: Timestamp,
    /// End of the confirmation leg. `None` when the trade failed.
    #[serde(default)]
    pub confirmed_at: Option<Timestamp>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default = "full_fill")]
    pub fill_fraction: f64,
    #[serde(default)]
    pub congested: bool,
    #[serde(default)]
    pub fee_shortfall: bool,
}

fn full_fill() -> f64 {
    1.0
}

impl LiveTradeRecord {
    pub fn network_latency_ms(&self) -> i64 {
        self.landed_at.millis_since(self.submitted_at)
    }

    pub fn confirmation_latency_ms(&self) -> Option<i64> {
        self.confirmed_at.map(|c| c.millis_since(self.landed_at))
    }

    /// Adverse slippage in basis points: positive when the fill was worse
    /// than expected for this side.
    pub fn slippage_bps(&self) -> Option<f64> {
        let actual = self.actual_price?;
        let diff = match self.side {
            Side::Buy => actual - self.expected_price,
            Side::Sell => self.expected_price - actual,
        };
        Some(diff / self.expected_price * 10_000.0)
    }

    pub fn is_partial(&self) -> bool {
        !self.failed && self.fill_fraction < 1.0 - 1e-9
    }
}
