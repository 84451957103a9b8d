//! Apply an [`ExecutionModel`] to one ideal fill.
//!
//! Draw order is fixed so a seeded generator reproduces identical fills:
//! network latency (2 draws), confirmation latency (2), failure (1),
//! partial fill (2). Every attempt consumes all seven draws, whether it
//! fails or not.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::{candle_index_at, Candle, Timestamp};

use super::model::ExecutionModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Price after `bps` of adverse slippage.
    pub fn slip(self, price: f64, bps: f64) -> f64 {
        match self {
            Side::Buy => price * (1.0 + bps / 10_000.0),
            Side::Sell => price * (1.0 - bps / 10_000.0),
        }
    }
}

/// The fill the strategy-level simulator assumed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdealFill {
    pub side: Side,
    pub candle_index: usize,
    pub timestamp: Timestamp,
    pub price: f64,
}

/// Market conditions around one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Trade notional, in the unit the slippage model was calibrated in.
    pub size: f64,
    #[serde(default)]
    pub congested: bool,
    #[serde(default)]
    pub fee_shortfall: bool,
    /// Whether a partial fill can occur on this attempt.
    #[serde(default = "yes")]
    pub allow_partial: bool,
}

fn yes() -> bool {
    true
}

impl ExecutionContext {
    pub fn new(size: f64) -> Self {
        Self {
            size,
            congested: false,
            fee_shortfall: false,
            allow_partial: true,
        }
    }

    pub fn congested(mut self, congested: bool) -> Self {
        self.congested = congested;
        self
    }

    pub fn fee_shortfall(mut self, fee_shortfall: bool) -> Self {
        self.fee_shortfall = fee_shortfall;
        self
    }

    pub fn without_partials(mut self) -> Self {
        self.allow_partial = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActualFill {
    pub side: Side,
    /// Candle the ideal fill was on.
    pub requested_index: usize,
    /// Candle the delayed fill landed on.
    pub candle_index: usize,
    pub timestamp: Timestamp,
    pub latency_ms: f64,
    /// Price before slippage.
    pub reference_price: f64,
    pub price: f64,
    pub slippage_bps: f64,
    /// Filled share of the requested size, in (0, 1].
    pub fill_fraction: f64,
    /// True when the fill was forced after exhausting retries.
    #[serde(default)]
    pub forced: bool,
}

/// An attempt that was sent and did not land.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FailedFill {
    pub side: Side,
    pub requested_index: usize,
    pub candle_index: usize,
    pub timestamp: Timestamp,
    pub latency_ms: f64,
    pub reference_price: f64,
    pub failure_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FillOutcome {
    Filled(ActualFill),
    Failed(FailedFill),
}

impl FillOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, FillOutcome::Filled(_))
    }
}

/// Apply latency, failure, slippage and partial fills to `ideal`.
///
/// The delay is re-resolved against `candles`: when it carries the fill past
/// the ideal candle, the fill is attributed to the candle covering the
/// delayed timestamp and references that candle's open. A delay that runs
/// past the final candle stays on the final candle.
pub fn apply_friction<R: Rng + ?Sized>(
    ideal: &IdealFill,
    candles: &[Candle],
    model: &ExecutionModel,
    ctx: &ExecutionContext,
    rng: &mut R,
) -> FillOutcome {
    let latency_ms = model.network_latency.sample(rng) + model.confirmation_latency.sample(rng);
    let failure_probability = model.failure.probability(ctx.congested, ctx.fee_shortfall);
    let failed = rng.gen::<f64>() < failure_probability;
    let partial = model.partial_fill.sample(rng);

    let timestamp = ideal.timestamp.plus_millis(latency_ms);
    let candle_index = candle_index_at(candles, timestamp)
        .unwrap_or(ideal.candle_index)
        .max(ideal.candle_index);
    let reference_price = if candle_index == ideal.candle_index {
        ideal.price
    } else {
        candles[candle_index].open
    };

    if failed {
        return FillOutcome::Failed(FailedFill {
            side: ideal.side,
            requested_index: ideal.candle_index,
            candle_index,
            timestamp,
            latency_ms,
            reference_price,
            failure_probability,
        });
    }

    let slippage_bps = model.slippage.bps(ctx.size);
    FillOutcome::Filled(ActualFill {
        side: ideal.side,
        requested_index: ideal.candle_index,
        candle_index,
        timestamp,
        latency_ms,
        reference_price,
        price: ideal.side.slip(reference_price, slippage_bps),
        slippage_bps,
        fill_fraction: if ctx.allow_partial { partial } else { 1.0 },
        forced: false,
    })
}
