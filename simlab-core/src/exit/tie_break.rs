//! Tie-break policies: resolve a stop and a profit target that are both
//! reachable inside one candle's [low, high] range.
//!
//! A candle only tells us its extremes, not the order they printed in, so
//! the simulator must pick one. `Conservative` is the default and assumes
//! the stop printed first.

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakPolicy {
    /// Stop before target.
    #[default]
    Conservative,
    /// Target before stop. Provisional.
    Optimistic,
    /// Infer the intrabar path from the open: an open nearer the high is
    /// assumed to visit the high first (O→H→L→C), otherwise the low
    /// (O→L→H→C). Equidistant opens resolve stop-first. Provisional.
    OhlcPath,
}

impl TieBreakPolicy {
    /// True if the stop is checked before profit targets on this candle.
    pub fn stop_first(self, candle: &Candle) -> bool {
        match self {
            TieBreakPolicy::Conservative => true,
            TieBreakPolicy::Optimistic => false,
            TieBreakPolicy::OhlcPath => {
                let to_high = candle.high - candle.open;
                let to_low = candle.open - candle.low;
                to_low <= to_high
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TieBreakPolicy::Conservative => "conservative",
            TieBreakPolicy::Optimistic => "optimistic",
            TieBreakPolicy::OhlcPath => "ohlc_path",
        }
    }

    /// Policies other than `Conservative` have no settled reference
    /// behaviour yet.
    pub fn is_provisional(self) -> bool {
        self != TieBreakPolicy::Conservative
    }
}
