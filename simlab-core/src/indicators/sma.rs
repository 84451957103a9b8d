//! Simple moving average of closes. First value at `period - 1`.

use crate::domain::Candle;

use super::indicator::Indicator;
use super::rolling::{collect_series, RollingWindow};

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<Vec<f64>> {
        let mut window = RollingWindow::new(self.period);
        vec![collect_series(
            candles.iter().map(|c| window.push(c.close).map(|w| w.mean())),
        )]
    }
}
