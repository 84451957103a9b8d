//! Moving Average Convergence Divergence (MACD).
//!
//! value = EMA(close, fast) - EMA(close, slow)
//! signal = EMA(value, signal_period)
//! histogram = value - signal
//!
//! Lookback: slow + signal_period - 2, the first index where every field
//! is defined.

use crate::domain::Candle;

use super::indicator::{Indicator, VALUE_FIELD};
use super::rolling::Smoother;

const FIELDS: &[&str] = &[VALUE_FIELD, "signal", "histogram"];

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be below slow period");
        Self {
            fast,
            slow,
            signal,
            name: format!("macd_{fast}_{slow}_{signal}"),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow + self.signal - 2
    }

    fn fields(&self) -> &'static [&'static str] {
        FIELDS
    }

    fn compute(&self, candles: &[Candle]) -> Vec<Vec<f64>> {
        let mut out = vec![vec![f64::NAN; candles.len()]; FIELDS.len()];
        let mut fast = Smoother::ema(self.fast);
        let mut slow = Smoother::ema(self.slow);
        let mut signal = Smoother::ema(self.signal);
        for (i, c) in candles.iter().enumerate() {
            let (Some(f), Some(s)) = (fast.push(c.close), slow.push(c.close)) else {
                continue;
            };
            let line = f - s;
            // The line alone is ready at slow - 1; all three fields are
            // published together once the signal line has seeded.
            let Some(sig) = signal.push(line) else {
                continue;
            };
            out[0][i] = line;
            out[1][i] = sig;
            out[2][i] = line - sig;
        }
        out
    }
}
