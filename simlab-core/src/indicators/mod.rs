//! Indicator engine and concrete indicator implementations.
//!
//! Every indicator implements [`Indicator`]. A strategy's declared
//! indicators are built once through [`IndicatorSpec::build`], precomputed
//! over the run's candles by [`IndicatorEngine`], and read per candle through
//! [`IndicatorSnapshot`].
//!
//! Multi-field indicators (MACD, Bollinger, price) expose every field from a
//! single instance; `value` is always the first field.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod engine;
pub mod indicator;
pub mod macd;
pub mod price;
pub mod rolling;
pub mod rsi;
pub mod sma;
pub mod spec;

pub use atr::Atr;
pub use bollinger::Bollinger;
pub use ema::Ema;
pub use engine::{IndicatorEngine, IndicatorError, IndicatorSnapshot};
pub use indicator::{Indicator, VALUE_FIELD};
pub use macd::Macd;
pub use price::Price;
pub use rsi::Rsi;
pub use sma::Sma;
pub use spec::{IndicatorKind, IndicatorSpec};

/// One-minute candles from closes: each opens at the previous close and
/// spans one unit either side of its body.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<crate::domain::Candle> {
    use crate::domain::{Candle, Timestamp};
    let mut prev = None;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = prev.replace(close).unwrap_or(close);
            Candle::new(
                Timestamp::from_secs(1_700_000_000 + 60 * i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1_000.0,
            )
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, tolerance: f64) {
    let diff = (actual - expected).abs();
    assert!(diff < tolerance, "{actual} != {expected} (|diff| {diff} >= {tolerance})");
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
