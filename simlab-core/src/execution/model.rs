//! ExecutionModel: the calibrated description of a venue's execution friction.
//!
//! Latency, slippage, failure and partial-fill behaviour for one venue. A
//! model is either written by hand (and validated) or produced by
//! calibration from live-trade records, in which case it carries
//! [`CalibrationMeta`].

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Current schema version written into every model.
pub const MODEL_SCHEMA_VERSION: u32 = 1;

/// Latency distribution for one leg, described by its percentiles.
///
/// Sampling uses a piecewise-linear inverse CDF through
/// `(0, 0) (0.5, p50) (0.9, p90) (0.99, p99) (1, p99 + (p99 - p90))`,
/// then adds uniform jitter in `[-jitter, +jitter]`, floored at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyDistribution {
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
    #[serde(default)]
    pub jitter_ms: f64,
}

impl LatencyDistribution {
    pub fn new(p50_ms: f64, p90_ms: f64, p99_ms: f64, jitter_ms: f64) -> Self {
        Self {
            p50_ms,
            p90_ms,
            p99_ms,
            jitter_ms,
        }
    }

    /// Zero latency, for deterministic fills.
    pub fn instant() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Latency at quantile `u` in [0, 1], before jitter.
    pub fn quantile(&self, u: f64) -> f64 {
        let tail = self.p99_ms + (self.p99_ms - self.p90_ms);
        let knots = [
            (0.0, 0.0),
            (0.5, self.p50_ms),
            (0.9, self.p90_ms),
            (0.99, self.p99_ms),
            (1.0, tail),
        ];
        let u = u.clamp(0.0, 1.0);
        for pair in knots.windows(2) {
            let (u0, v0) = pair[0];
            let (u1, v1) = pair[1];
            if u <= u1 {
                return v0 + (v1 - v0) * (u - u0) / (u1 - u0);
            }
        }
        tail
    }

    /// Draw one latency in milliseconds. Always consumes two draws from `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let base = self.quantile(rng.gen::<f64>());
        let jitter = (rng.gen::<f64>() * 2.0 - 1.0) * self.jitter_ms;
        (base + jitter).max(0.0)
    }

    fn validate(&self, leg: &str) -> Result<(), ConfigError> {
        let values = [self.p50_ms, self.p90_ms, self.p99_ms, self.jitter_ms];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ConfigError::InvalidExecutionModel(format!(
                "{leg} latency values must be finite and non-negative"
            )));
        }
        if !(self.p50_ms <= self.p90_ms && self.p90_ms <= self.p99_ms) {
            return Err(ConfigError::InvalidExecutionModel(format!(
                "{leg} latency percentiles must be ordered p50 <= p90 <= p99"
            )));
        }
        Ok(())
    }
}

/// Slippage in basis points as a function of trade size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlippageModel {
    Fixed { bps: f64 },
    /// `coefficient * sqrt(size)`, clamped to `[min_bps, max_bps]`.
    SqrtSize {
        coefficient: f64,
        min_bps: f64,
        max_bps: f64,
    },
}

impl SlippageModel {
    pub fn bps(&self, size: f64) -> f64 {
        match *self {
            SlippageModel::Fixed { bps } => bps,
            SlippageModel::SqrtSize {
                coefficient,
                min_bps,
                max_bps,
            } => (coefficient * size.max(0.0).sqrt()).clamp(min_bps, max_bps),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            SlippageModel::Fixed { bps } if !bps.is_finite() || bps < 0.0 => Err(
                ConfigError::InvalidExecutionModel(format!("fixed slippage must be >= 0, got {bps}")),
            ),
            SlippageModel::SqrtSize {
                coefficient,
                min_bps,
                max_bps,
            } => {
                let finite = coefficient.is_finite() && min_bps.is_finite() && max_bps.is_finite();
                if !finite || coefficient < 0.0 || min_bps < 0.0 || min_bps > max_bps {
                    return Err(ConfigError::InvalidExecutionModel(format!(
                        "sqrt slippage needs coefficient >= 0 and 0 <= min_bps <= max_bps \
                         (got {coefficient}, {min_bps}, {max_bps})"
                    )));
                }
                Ok(())
            }
            SlippageModel::Fixed { .. } => Ok(()),
        }
    }
}

/// Per-attempt failure probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FailureModel {
    pub base_rate: f64,
    /// Added when the network is congested.
    #[serde(default)]
    pub congestion_delta: f64,
    /// Added when the priority fee was short.
    #[serde(default)]
    pub fee_shortfall_delta: f64,
    pub max_rate: f64,
}

impl FailureModel {
    pub fn never() -> Self {
        Self {
            base_rate: 0.0,
            congestion_delta: 0.0,
            fee_shortfall_delta: 0.0,
            max_rate: 0.0,
        }
    }

    pub fn probability(&self, congested: bool, fee_shortfall: bool) -> f64 {
        let mut p = self.base_rate;
        if congested {
            p += self.congestion_delta;
        }
        if fee_shortfall {
            p += self.fee_shortfall_delta;
        }
        p.min(self.max_rate).max(0.0)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("base_rate", self.base_rate),
            ("congestion_delta", self.congestion_delta),
            ("fee_shortfall_delta", self.fee_shortfall_delta),
            ("max_rate", self.max_rate),
        ];
        for (name, rate) in rates {
            if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::InvalidExecutionModel(format!(
                    "failure {name} must be in [0, 1], got {rate}"
                )));
            }
        }
        if self.base_rate > self.max_rate {
            return Err(ConfigError::InvalidExecutionModel(
                "failure base_rate exceeds max_rate".into(),
            ));
        }
        Ok(())
    }
}

/// Probability that a fill is partial, and the uniform range of the filled
/// fraction when it is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialFillModel {
    pub probability: f64,
    pub min_fraction: f64,
    pub max_fraction: f64,
}

impl PartialFillModel {
    pub fn never() -> Self {
        Self {
            probability: 0.0,
            min_fraction: 1.0,
            max_fraction: 1.0,
        }
    }

    /// Filled fraction in (0, 1]. Always consumes two draws from `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let partial = rng.gen::<f64>() < self.probability;
        let u = rng.gen::<f64>();
        if partial {
            self.min_fraction + (self.max_fraction - self.min_fraction) * u
        } else {
            1.0
        }
    }

    /// Expected filled fraction.
    pub fn mean_fraction(&self) -> f64 {
        let partial_mean = (self.min_fraction + self.max_fraction) / 2.0;
        1.0 - self.probability + self.probability * partial_mean
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let p = self.probability;
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::InvalidExecutionModel(format!(
                "partial fill probability must be in [0, 1], got {p}"
            )));
        }
        let (lo, hi) = (self.min_fraction, self.max_fraction);
        if !lo.is_finite() || !hi.is_finite() || lo <= 0.0 || lo > hi || hi > 1.0 {
            return Err(ConfigError::InvalidExecutionModel(format!(
                "partial fill fractions need 0 < min <= max <= 1, got [{lo}, {hi}]"
            )));
        }
        Ok(())
    }
}

/// Provenance of a calibrated model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMeta {
    pub calibrated_at: DateTime<Utc>,
    pub source: String,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionModel {
    pub venue: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub network_latency: LatencyDistribution,
    pub confirmation_latency: LatencyDistribution,
    pub slippage: SlippageModel,
    pub failure: FailureModel,
    pub partial_fill: PartialFillModel,
    /// Venue fee per side, in basis points.
    #[serde(default)]
    pub fee_bps: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationMeta>,
}

fn default_version() -> u32 {
    MODEL_SCHEMA_VERSION
}

impl ExecutionModel {
    /// No latency, no slippage, no failures, no partial fills.
    pub fn ideal(venue: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            version: MODEL_SCHEMA_VERSION,
            network_latency: LatencyDistribution::instant(),
            confirmation_latency: LatencyDistribution::instant(),
            slippage: SlippageModel::Fixed { bps: 0.0 },
            failure: FailureModel::never(),
            partial_fill: PartialFillModel::never(),
            fee_bps: 0.0,
            calibration: None,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.venue.trim().is_empty() {
            return Err(ConfigError::InvalidExecutionModel("venue must not be empty".into()));
        }
        self.network_latency.validate("network")?;
        self.confirmation_latency.validate("confirmation")?;
        self.slippage.validate()?;
        self.failure.validate()?;
        self.partial_fill.validate()?;
        if !self.fee_bps.is_finite() || self.fee_bps < 0.0 {
            return Err(ConfigError::InvalidExecutionModel(format!(
                "fee_bps must be >= 0, got {}",
                self.fee_bps
            )));
        }
        Ok(())
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let model: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let model: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }
}
