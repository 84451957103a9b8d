//! Candle: the fundamental market data unit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit of a raw timestamp as delivered by an upstream collaborator.
///
/// The unit is declared at the ingestion boundary, never inferred from the
/// magnitude of the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Seconds,
    Millis,
}

/// Point in time, always stored as milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * 1_000)
    }

    pub const fn from_raw(value: i64, unit: TimeUnit) -> Self {
        match unit {
            TimeUnit::Seconds => Self::from_secs(value),
            TimeUnit::Millis => Self::from_millis(value),
        }
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Shift forward by a (possibly fractional) number of milliseconds.
    ///
    /// Sub-millisecond remainders are rounded to the nearest millisecond.
    pub fn plus_millis(self, ms: f64) -> Self {
        Self(self.0 + ms.round() as i64)
    }

    /// Milliseconds elapsed from `earlier` to `self`.
    pub fn millis_since(self, earlier: Timestamp) -> i64 {
        self.0 - earlier.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// OHLCV candle for one interval of one token.
///
/// Candle sequences are immutable for the duration of a run and must be
/// sorted by timestamp before they reach the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: Timestamp, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, low <= open/close,
    /// strictly positive prices.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
    }

    /// True if `price` lies within this candle's [low, high] range.
    pub fn spans(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

/// True if the sequence is monotonically non-decreasing in timestamp.
pub fn is_sorted(candles: &[Candle]) -> bool {
    candles.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}

/// Index of the candle that covers `at`: the last candle whose timestamp is
/// `<= at`. Returns `None` if `at` precedes the first candle.
pub fn candle_index_at(candles: &[Candle], at: Timestamp) -> Option<usize> {
    let upper = candles.partition_point(|c| c.timestamp <= at);
    upper.checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_candle() -> Candle {
        Candle::new(Timestamp::from_secs(1_700_000_000), 100.0, 105.0, 98.0, 103.0, 5_000.0)
    }

    #[test]
    fn candle_is_sane() {
        assert!(sample_candle().is_sane());
    }

    #[test]
    fn candle_detects_void() {
        let mut c = sample_candle();
        c.open = f64::NAN;
        assert!(c.is_void());
        assert!(!c.is_sane());
    }

    #[test]
    fn candle_detects_inverted_range() {
        let mut c = sample_candle();
        c.high = 97.0;
        assert!(!c.is_sane());
    }

    #[test]
    fn timestamp_units_are_explicit() {
        assert_eq!(Timestamp::from_secs(2), Timestamp::from_millis(2_000));
        assert_eq!(Timestamp::from_raw(3, TimeUnit::Seconds).as_millis(), 3_000);
        assert_eq!(Timestamp::from_raw(3, TimeUnit::Millis).as_millis(), 3);
    }

    #[test]
    fn plus_millis_rounds() {
        let t = Timestamp::from_millis(1_000);
        assert_eq!(t.plus_millis(250.4).as_millis(), 1_250);
        assert_eq!(t.plus_millis(250.6).as_millis(), 1_251);
    }

    #[test]
    fn candle_index_lookup() {
        let candles: Vec<Candle> = (0..5)
            .map(|i| {
                Candle::new(Timestamp::from_secs(60 * i), 1.0, 1.0, 1.0, 1.0, 0.0)
            })
            .collect();
        assert_eq!(candle_index_at(&candles, Timestamp::from_secs(-1)), None);
        assert_eq!(candle_index_at(&candles, Timestamp::from_secs(0)), Some(0));
        assert_eq!(candle_index_at(&candles, Timestamp::from_secs(119)), Some(1));
        assert_eq!(candle_index_at(&candles, Timestamp::from_secs(120)), Some(2));
        assert_eq!(candle_index_at(&candles, Timestamp::from_secs(10_000)), Some(4));
        assert!(is_sorted(&candles));
    }
}
