//! Fit an [`ExecutionModel`] from live-trade records for one venue.
//!
//! - latency: linear-interpolated p50/p90/p99 per leg, jitter = 10% of the
//!   interquartile range
//! - slippage: least-squares `bps = k * sqrt(size)` through the origin,
//!   clamped to the observed bps range (floored at 0)
//! - failure: unconditional base rate plus the excess failure rate of the
//!   congested and fee-shortfall subsets, each floored at 0
//! - partial fills: observed partial share and fraction range of the
//!   successful trades

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::error::ConfigError;
use crate::execution::{
    CalibrationMeta, ExecutionModel, FailureModel, LatencyDistribution, PartialFillModel,
    SlippageModel, MODEL_SCHEMA_VERSION,
};

use super::record::LiveTradeRecord;
use super::stats::{mean, percentile_sorted, rate, sorted, sqrt_law_coefficient, std_dev};

/// Jitter as a share of a leg's interquartile range.
pub const JITTER_IQR_SHARE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("no live-trade records supplied")]
    EmptySample,

    #[error("no records for venue '{venue}' (venues present: {available})")]
    NoRecordsForVenue { venue: String, available: String },

    #[error("all {0} records for the venue failed; latency and slippage cannot be estimated")]
    AllFailed(usize),

    #[error("record {index} is unusable: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("calibration produced a non-finite {0}")]
    NonFinite(&'static str),

    #[error("calibrated model is invalid: {0}")]
    InvalidModel(#[from] ConfigError),
}

/// Provenance attached to the calibrated model.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOptions {
    pub source: String,
    pub calibrated_at: DateTime<Utc>,
    /// Venue fee per side; not observable from the records.
    pub fee_bps: f64,
}

impl CalibrationOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            calibrated_at: Utc::now(),
            fee_bps: 0.0,
        }
    }

    pub fn at(mut self, calibrated_at: DateTime<Utc>) -> Self {
        self.calibrated_at = calibrated_at;
        self
    }

    pub fn with_fee_bps(mut self, fee_bps: f64) -> Self {
        self.fee_bps = fee_bps;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub mean_ms: f64,
    pub p25_ms: f64,
    pub p50_ms: f64,
    pub p75_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureBreakdown {
    pub base_rate: f64,
    pub congested_samples: usize,
    pub congested_rate: Option<f64>,
    pub congestion_delta: f64,
    pub fee_shortfall_samples: usize,
    pub fee_shortfall_rate: Option<f64>,
    pub fee_shortfall_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStats {
    pub sample_size: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub network: LatencyStats,
    pub confirmation: LatencyStats,
    pub slippage_mean_bps: f64,
    pub slippage_std_bps: f64,
    pub slippage_coefficient: f64,
    pub failure: FailureBreakdown,
    pub partial_fill_probability: f64,
    /// Mean filled fraction over partial fills only; 1.0 when there were none.
    pub mean_partial_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub model: ExecutionModel,
    pub stats: CalibrationStats,
}

pub fn calibrate(
    records: &[LiveTradeRecord],
    venue: &str,
    options: &CalibrationOptions,
) -> Result<CalibrationReport, CalibrationError> {
    if records.is_empty() {
        return Err(CalibrationError::EmptySample);
    }
    let venue_records: Vec<(usize, &LiveTradeRecord)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.venue == venue)
        .collect();
    if venue_records.is_empty() {
        let mut venues: Vec<&str> = records.iter().map(|r| r.venue.as_str()).collect();
        venues.sort_unstable();
        venues.dedup();
        return Err(CalibrationError::NoRecordsForVenue {
            venue: venue.to_string(),
            available: venues.join(", "),
        });
    }
    for (index, record) in &venue_records {
        check_record(*index, record)?;
    }

    let sample_size = venue_records.len();
    let successes: Vec<&LiveTradeRecord> = venue_records
        .iter()
        .map(|(_, r)| *r)
        .filter(|r| !r.failed)
        .collect();
    if successes.is_empty() {
        return Err(CalibrationError::AllFailed(sample_size));
    }

    // ── Failure decomposition ──
    let all = || venue_records.iter().map(|(_, r)| *r);
    let base_rate = rate(all().map(|r| r.failed)).ok_or(CalibrationError::EmptySample)?;
    let congested_rate = rate(all().filter(|r| r.congested).map(|r| r.failed));
    let fee_shortfall_rate = rate(all().filter(|r| r.fee_shortfall).map(|r| r.failed));
    let excess = |conditional: Option<f64>| conditional.map_or(0.0, |c| (c - base_rate).max(0.0));
    let failure_breakdown = FailureBreakdown {
        base_rate,
        congested_samples: all().filter(|r| r.congested).count(),
        congested_rate,
        congestion_delta: excess(congested_rate),
        fee_shortfall_samples: all().filter(|r| r.fee_shortfall).count(),
        fee_shortfall_rate,
        fee_shortfall_delta: excess(fee_shortfall_rate),
    };

    // ── Latency ──
    let network = latency_stats(successes.iter().map(|r| r.network_latency_ms() as f64));
    let confirmation = latency_stats(
        successes
            .iter()
            .filter_map(|r| r.confirmation_latency_ms())
            .map(|ms| ms as f64),
    );

    // ── Slippage ──
    let points: Vec<(f64, f64)> = successes
        .iter()
        .filter_map(|r| r.slippage_bps().map(|bps| (r.size, bps)))
        .collect();
    let bps: Vec<f64> = points.iter().map(|(_, b)| *b).collect();
    let coefficient = sqrt_law_coefficient(&points)
        .ok_or(CalibrationError::NonFinite("slippage coefficient"))?
        .max(0.0);
    let bps_sorted = sorted(bps.iter().copied());
    let min_bps = bps_sorted.first().copied().unwrap_or(0.0).max(0.0);
    let max_bps = bps_sorted.last().copied().unwrap_or(0.0).max(min_bps);

    // ── Partial fills ──
    let partial_fractions: Vec<f64> = successes
        .iter()
        .filter(|r| r.is_partial())
        .map(|r| r.fill_fraction)
        .collect();
    let partial_fill_probability = partial_fractions.len() as f64 / successes.len() as f64;
    let partial_fill = if partial_fractions.is_empty() {
        PartialFillModel::never()
    } else {
        let fractions = sorted(partial_fractions.iter().copied());
        PartialFillModel {
            probability: partial_fill_probability,
            min_fraction: fractions[0],
            max_fraction: fractions[fractions.len() - 1],
        }
    };

    let failure = FailureModel {
        base_rate,
        congestion_delta: failure_breakdown.congestion_delta,
        fee_shortfall_delta: failure_breakdown.fee_shortfall_delta,
        max_rate: (base_rate + failure_breakdown.congestion_delta + failure_breakdown.fee_shortfall_delta)
            .min(1.0),
    };

    let model = ExecutionModel {
        venue: venue.to_string(),
        version: MODEL_SCHEMA_VERSION,
        network_latency: latency_distribution(&network, "network latency")?,
        confirmation_latency: latency_distribution(&confirmation, "confirmation latency")?,
        slippage: SlippageModel::SqrtSize {
            coefficient,
            min_bps,
            max_bps,
        },
        failure,
        partial_fill,
        fee_bps: options.fee_bps,
        calibration: Some(CalibrationMeta {
            calibrated_at: options.calibrated_at,
            source: options.source.clone(),
            sample_size,
        }),
    };
    ensure_finite(&model)?;
    model.validate()?;

    let stats = CalibrationStats {
        sample_size,
        succeeded: successes.len(),
        failed: sample_size - successes.len(),
        network,
        confirmation,
        slippage_mean_bps: mean(&bps),
        slippage_std_bps: std_dev(&bps),
        slippage_coefficient: coefficient,
        failure: failure_breakdown,
        partial_fill_probability,
        mean_partial_fraction: if partial_fractions.is_empty() {
            1.0
        } else {
            mean(&partial_fractions)
        },
    };
    if !stats.slippage_mean_bps.is_finite() {
        return Err(CalibrationError::NonFinite("slippage mean"));
    }

    info!(
        venue,
        samples = sample_size,
        failed = stats.failed,
        network_p50_ms = stats.network.p50_ms,
        slippage_k = coefficient,
        base_failure = base_rate,
        "calibrated execution model"
    );

    Ok(CalibrationReport { model, stats })
}

fn check_record(index: usize, r: &LiveTradeRecord) -> Result<(), CalibrationError> {
    let invalid = |reason: &str| CalibrationError::InvalidRecord {
        index,
        reason: reason.to_string(),
    };
    if !r.size.is_finite() || r.size < 0.0 {
        return Err(invalid("size must be finite and non-negative"));
    }
    if !r.expected_price.is_finite() || r.expected_price <= 0.0 {
        return Err(invalid("expected price must be positive"));
    }
    if r.network_latency_ms() < 0 {
        return Err(invalid("landed before it was submitted"));
    }
    if r.failed {
        return Ok(());
    }
    match r.actual_price {
        Some(p) if p.is_finite() && p > 0.0 => {}
        _ => return Err(invalid("successful trade needs a positive actual price")),
    }
    match r.confirmation_latency_ms() {
        Some(ms) if ms >= 0 => {}
        Some(_) => return Err(invalid("confirmed before it landed")),
        None => return Err(invalid("successful trade needs a confirmation timestamp")),
    }
    if !r.fill_fraction.is_finite() || r.fill_fraction <= 0.0 || r.fill_fraction > 1.0 {
        return Err(invalid("fill fraction must be in (0, 1]"));
    }
    Ok(())
}

fn latency_stats(values: impl IntoIterator<Item = f64>) -> LatencyStats {
    let v = sorted(values);
    LatencyStats {
        samples: v.len(),
        mean_ms: mean(&v),
        p25_ms: percentile_sorted(&v, 0.25),
        p50_ms: percentile_sorted(&v, 0.50),
        p75_ms: percentile_sorted(&v, 0.75),
        p90_ms: percentile_sorted(&v, 0.90),
        p99_ms: percentile_sorted(&v, 0.99),
    }
}

fn latency_distribution(
    stats: &LatencyStats,
    what: &'static str,
) -> Result<LatencyDistribution, CalibrationError> {
    let d = LatencyDistribution::new(
        stats.p50_ms,
        stats.p90_ms,
        stats.p99_ms,
        JITTER_IQR_SHARE * (stats.p75_ms - stats.p25_ms),
    );
    if [d.p50_ms, d.p90_ms, d.p99_ms, d.jitter_ms].iter().all(|v| v.is_finite()) {
        Ok(d)
    } else {
        Err(CalibrationError::NonFinite(what))
    }
}

fn ensure_finite(model: &ExecutionModel) -> Result<(), CalibrationError> {
    let fields = [
        ("failure rate", model.failure.base_rate),
        ("failure rate", model.failure.max_rate),
        ("partial fill probability", model.partial_fill.probability),
        ("partial fill fraction", model.partial_fill.min_fraction),
        ("partial fill fraction", model.partial_fill.max_fraction),
        ("fee", model.fee_bps),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(CalibrationError::NonFinite(name));
        }
    }
    if let SlippageModel::SqrtSize {
        coefficient,
        min_bps,
        max_bps,
    } = model.slippage
    {
        if !(coefficient.is_finite() && min_bps.is_finite() && max_bps.is_finite()) {
            return Err(CalibrationError::NonFinite("slippage"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timestamp;
    use crate::execution::Side;

    fn ok_record(venue: &str, size: f64, slip_bps: f64, net_ms: i64, conf_ms: i64) -> LiveTradeRecord {
        LiveTradeRecord {
            venue: venue.into(),
            side: Side::Buy,
            size,
            expected_price: 1.0,
            actual_price: Some(1.0 + slip_bps / 10_000.0),
            submitted_at: Timestamp::from_millis(0),
            landed_at: Timestamp::from_millis(net_ms),
            confirmed_at: Some(Timestamp::from_millis(net_ms + conf_ms)),
            failed: false,
            fill_fraction: 1.0,
            congested: false,
            fee_shortfall: false,
        }
    }

    fn failed_record(venue: &str) -> LiveTradeRecord {
        LiveTradeRecord {
            actual_price: None,
            confirmed_at: None,
            failed: true,
            ..ok_record(venue, 1.0, 0.0, 100, 0)
        }
    }

    fn opts() -> CalibrationOptions {
        CalibrationOptions::new("unit-test").at(DateTime::from_timestamp(0, 0).unwrap())
    }

    #[test]
    fn empty_sample_fails_loudly() {
        assert_eq!(calibrate(&[], "v", &opts()), Err(CalibrationError::EmptySample));
    }

    #[test]
    fn venue_mismatch_fails_loudly() {
        let records = vec![ok_record("raydium", 1.0, 5.0, 100, 400)];
        let err = calibrate(&records, "jupiter", &opts()).unwrap_err();
        assert!(matches!(err, CalibrationError::NoRecordsForVenue { ref available, .. } if available == "raydium"));
    }

    #[test]
    fn all_failed_is_an_error_not_nan() {
        let records = vec![failed_record("v"), failed_record("v")];
        assert_eq!(calibrate(&records, "v", &opts()), Err(CalibrationError::AllFailed(2)));
    }

    #[test]
    fn successful_record_without_price_rejected() {
        let mut r = ok_record("v", 1.0, 5.0, 100, 400);
        r.actual_price = None;
        assert!(matches!(
            calibrate(&[r], "v", &opts()),
            Err(CalibrationError::InvalidRecord { index: 0, .. })
        ));
    }

    #[test]
    fn single_record_calibrates() {
        let report = calibrate(&[ok_record("v", 4.0, 20.0, 100, 400)], "v", &opts()).unwrap();
        assert_eq!(report.model.network_latency.p50_ms, 100.0);
        assert_eq!(report.model.network_latency.jitter_ms, 0.0);
        assert!((report.stats.slippage_coefficient - 10.0).abs() < 1e-9);
        assert_eq!(report.model.calibration.as_ref().unwrap().sample_size, 1);
        assert!(report.model.is_calibrated());
    }

    #[test]
    fn negative_excess_floored_at_zero() {
        let mut records: Vec<LiveTradeRecord> = (0..8).map(|_| ok_record("v", 1.0, 5.0, 100, 400)).collect();
        records.push(failed_record("v"));
        records.push(failed_record("v"));
        // Congested trades all succeed: conditional rate below base.
        records[0].congested = true;
        records[1].congested = true;
        let report = calibrate(&records, "v", &opts()).unwrap();
        assert!((report.stats.failure.base_rate - 0.2).abs() < 1e-12);
        assert_eq!(report.stats.failure.congested_rate, Some(0.0));
        assert_eq!(report.model.failure.congestion_delta, 0.0);
    }

    #[test]
    fn partial_fill_statistics() {
        let mut records: Vec<LiveTradeRecord> = (0..4).map(|_| ok_record("v", 1.0, 5.0, 100, 400)).collect();
        records[0].fill_fraction = 0.5;
        records[1].fill_fraction = 0.7;
        let report = calibrate(&records, "v", &opts()).unwrap();
        assert_eq!(report.model.partial_fill.probability, 0.5);
        assert_eq!(report.model.partial_fill.min_fraction, 0.5);
        assert_eq!(report.model.partial_fill.max_fraction, 0.7);
        assert!((report.stats.mean_partial_fraction - 0.6).abs() < 1e-12);
    }
}
