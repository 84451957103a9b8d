//! Bollinger bands around the SMA of closes, using population standard
//! deviation. `width` is the band span relative to the middle.

use crate::domain::Candle;

use super::indicator::{Indicator, VALUE_FIELD};
use super::rolling::RollingWindow;

const FIELDS: &[&str] = &[VALUE_FIELD, "upper", "lower", "width"];

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            multiplier,
            name: format!("bollinger_{period}_{multiplier}"),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn fields(&self) -> &'static [&'static str] {
        FIELDS
    }

    fn compute(&self, candles: &[Candle]) -> Vec<Vec<f64>> {
        let mut out = vec![vec![f64::NAN; candles.len()]; FIELDS.len()];
        let mut window = RollingWindow::new(self.period);
        for (i, c) in candles.iter().enumerate() {
            let Some(w) = window.push(c.close) else {
                continue;
            };
            let mid = w.mean();
            let half = self.multiplier * w.std_dev();
            out[0][i] = mid;
            out[1][i] = mid + half;
            out[2][i] = mid - half;
            out[3][i] = if mid == 0.0 { f64::NAN } else { 2.0 * half / mid };
        }
        out
    }
}
