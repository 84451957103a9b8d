//! Exponential moving average of closes, seeded with the SMA of the first
//! `period` closes. First value at `period - 1`.

use crate::domain::Candle;

use super::indicator::Indicator;
use super::rolling::{collect_series, Smoother};

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<Vec<f64>> {
        let mut ema = Smoother::ema(self.period);
        vec![collect_series(candles.iter().map(|c| ema.push(c.close)))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn period_one_tracks_close() {
        let out = &Ema::new(1).compute(&make_candles(&[3.0, 5.0, 4.0]))[0];
        assert_eq!(out, &vec![3.0, 5.0, 4.0]);
    }

    #[test]
    fn recursion_after_seed() {
        // alpha = 0.5, seeded with mean(2, 4, 6) = 4
        let out = &Ema::new(3).compute(&make_candles(&[2.0, 4.0, 6.0, 10.0, 0.0]))[0];
        assert!(out[1].is_nan());
        assert_approx(out[2], 4.0, DEFAULT_EPSILON);
        assert_approx(out[3], 7.0, DEFAULT_EPSILON);
        assert_approx(out[4], 3.5, DEFAULT_EPSILON);
    }

    #[test]
    fn bad_close_after_seed_ends_series() {
        let mut candles = make_candles(&[1.0, 2.0, 3.0, 4.0]);
        candles[2].close = f64::NAN;
        let out = &Ema::new(2).compute(&candles)[0];
        assert_approx(out[1], 1.5, DEFAULT_EPSILON);
        assert!(out[2].is_nan() && out[3].is_nan());
    }
}
