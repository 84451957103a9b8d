//! Relative strength index with Wilder-smoothed gains and losses.
//!
//! Close-to-close changes start at the second candle, so RSI(n) first
//! reads at index `n`. A flat window reads 50.

use crate::domain::Candle;

use super::indicator::Indicator;
use super::rolling::{collect_series, Smoother};

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<Vec<f64>> {
        let mut gains = Smoother::wilder(self.period);
        let mut losses = Smoother::wilder(self.period);
        let mut prev_close: Option<f64> = None;

        let series = candles.iter().map(|c| {
            let change = c.close - prev_close.replace(c.close)?;
            let gain = gains.push(change.max(0.0));
            let loss = losses.push((-change).max(0.0));
            Some(strength_index(gain?, loss?))
        });
        vec![collect_series(series)]
    }
}

fn strength_index(avg_gain: f64, avg_loss: f64) -> f64 {
    match (avg_gain > 0.0, avg_loss > 0.0) {
        (false, false) => 50.0,
        (true, false) => 100.0,
        (false, true) => 0.0,
        (true, true) => 100.0 * avg_gain / (avg_gain + avg_loss),
    }
}
