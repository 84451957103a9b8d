//! Streaming building blocks shared by the indicators.
//!
//! Both types are fed one value per candle and answer `None` until they have
//! seen enough history, so a caller never has to track warm-up by index.
//! A NaN input restarts the warm-up; the indicator is undefined again until
//! a full window of finite values has been seen since.

use std::collections::VecDeque;

/// Fixed-length window over the most recent finite values.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    period: usize,
    buf: VecDeque<f64>,
    sum: f64,
}

impl RollingWindow {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "window period must be >= 1");
        Self {
            period,
            buf: VecDeque::with_capacity(period),
            sum: 0.0,
        }
    }

    /// Push `value`. Returns the full window, or `None` while it is still
    /// filling.
    pub fn push(&mut self, value: f64) -> Option<Window<'_>> {
        if value.is_nan() {
            self.buf.clear();
            self.sum = 0.0;
            return None;
        }
        if self.buf.len() == self.period {
            if let Some(oldest) = self.buf.pop_front() {
                self.sum -= oldest;
            }
        }
        self.buf.push_back(value);
        self.sum += value;
        (self.buf.len() == self.period).then_some(Window {
            values: &self.buf,
            sum: self.sum,
        })
    }
}

/// A full window, borrowed from its [`RollingWindow`].
#[derive(Debug, Clone, Copy)]
pub struct Window<'w> {
    values: &'w VecDeque<f64>,
    sum: f64,
}

impl Window<'_> {
    pub fn mean(&self) -> f64 {
        self.sum / self.values.len() as f64
    }

    /// Population standard deviation, two-pass over the window.
    pub fn std_dev(&self) -> f64 {
        let mean = self.mean();
        let ss: f64 = self.values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / self.values.len() as f64).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Seeding { count: usize, sum: f64 },
    Running(f64),
    /// A NaN arrived after seeding; the recursion cannot recover.
    Tainted,
}

/// Recursive smoother `s[t] = alpha * x[t] + (1 - alpha) * s[t-1]`, seeded
/// with the mean of the first `period` finite values.
#[derive(Debug, Clone)]
pub struct Smoother {
    period: usize,
    alpha: f64,
    phase: Phase,
}

impl Smoother {
    /// Exponential moving average weighting, `alpha = 2 / (period + 1)`.
    pub fn ema(period: usize) -> Self {
        Self::with_alpha(period, 2.0 / (period as f64 + 1.0))
    }

    /// Wilder's weighting, `alpha = 1 / period`.
    pub fn wilder(period: usize) -> Self {
        Self::with_alpha(period, 1.0 / period as f64)
    }

    fn with_alpha(period: usize, alpha: f64) -> Self {
        assert!(period >= 1, "smoothing period must be >= 1");
        Self {
            period,
            alpha,
            phase: Phase::Seeding { count: 0, sum: 0.0 },
        }
    }

    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.phase = match (self.phase, value.is_nan()) {
            (Phase::Tainted, _) | (Phase::Running(_), true) => Phase::Tainted,
            (Phase::Seeding { .. }, true) => Phase::Seeding { count: 0, sum: 0.0 },
            (Phase::Seeding { count, sum }, false) if count + 1 == self.period => {
                Phase::Running((sum + value) / self.period as f64)
            }
            (Phase::Seeding { count, sum }, false) => Phase::Seeding {
                count: count + 1,
                sum: sum + value,
            },
            (Phase::Running(prev), false) => Phase::Running(self.alpha * value + (1.0 - self.alpha) * prev),
        };
        match self.phase {
            Phase::Running(v) => Some(v),
            _ => None,
        }
    }
}

/// Collect a per-candle stream into a series, NaN where it had no value.
pub fn collect_series(values: impl IntoIterator<Item = Option<f64>>) -> Vec<f64> {
    values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}
