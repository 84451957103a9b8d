//! Raw candle fields exposed as an indicator.
//!
//! Lets signal conditions compare against the current price without a
//! special case: `value` is the close, the remaining fields mirror the
//! candle. Lookback: 0.

use crate::domain::Candle;

use super::indicator::{Indicator, VALUE_FIELD};

const FIELDS: &[&str] = &[VALUE_FIELD, "open", "high", "low", "close", "volume"];

#[derive(Debug, Clone)]
pub struct Price {
    name: String,
}

impl Price {
    pub fn new() -> Self {
        Self {
            name: "price".to_string(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Price {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn fields(&self) -> &'static [&'static str] {
        FIELDS
    }

    fn compute(&self, candles: &[Candle]) -> Vec<Vec<f64>> {
        vec![
            candles.iter().map(|c| c.close).collect(),
            candles.iter().map(|c| c.open).collect(),
            candles.iter().map(|c| c.high).collect(),
            candles.iter().map(|c| c.low).collect(),
            candles.iter().map(|c| c.close).collect(),
            candles.iter().map(|c| c.volume).collect(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;

    #[test]
    fn price_mirrors_candles() {
        let candles = make_candles(&[10.0, 12.0]);
        let out = Price::new().compute(&candles);
        assert_eq!(out.len(), Price::new().fields().len());
        assert_eq!(out[0], vec![10.0, 12.0]);
        assert_eq!(out[1], vec![10.0, 10.0]);
        assert_eq!(out[2], vec![11.0, 13.0]);
    }
}
