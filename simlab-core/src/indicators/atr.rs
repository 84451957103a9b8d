//! Average true range, Wilder-smoothed.
//!
//! The first candle has no previous close and contributes no range, so
//! ATR(n) first reads at index `n`.

use crate::domain::Candle;

use super::indicator::Indicator;
use super::rolling::{collect_series, Smoother};

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Largest of the candle's own range and its gaps from `prev_close`.
pub fn true_range(candle: &Candle, prev_close: f64) -> f64 {
    let range = candle.high - candle.low;
    range
        .max((candle.high - prev_close).abs())
        .max((candle.low - prev_close).abs())
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<Vec<f64>> {
        let mut atr = Smoother::wilder(self.period);
        let series = candles.iter().enumerate().map(|(i, c)| {
            let prev = i.checked_sub(1).map(|p| candles[p].close)?;
            atr.push(true_range(c, prev))
        });
        vec![collect_series(series)]
    }
}
