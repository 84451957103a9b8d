//! Executed-trade overlay: replays a simulated trade's legs through the
//! execution model.
//!
//! The strategy-level trade is left untouched. Targets, stops and their
//! percentages were computed on the original intended size; the overlay only
//! scales each leg by the entry's realised fill fraction.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::{Candle, EventReason, ExitFill, Timestamp, TradeId, TradeRecord};

use super::friction::{apply_friction, ActualFill, ExecutionContext, FillOutcome, IdealFill, Side};
use super::model::ExecutionModel;

/// Retries after a failed exit leg before the leg is forced.
pub const DEFAULT_EXIT_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    Entry,
    Exit,
}

/// One attempt in the execution log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegAttempt {
    pub leg: LegKind,
    /// Index of the exit leg in the trade record; 0 for the entry.
    pub leg_index: usize,
    pub attempt: u32,
    pub outcome: FillOutcome,
}

/// One executed exit leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutedExit {
    /// Fraction of the original intended size this leg was meant to close.
    pub intended_size: f64,
    /// Fraction actually closed (intended size scaled by the entry fill).
    pub realized_size: f64,
    pub reason: EventReason,
    /// `None` for a still-open leg, which is marked at its close without friction.
    pub fill: Option<ActualFill>,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedTrade {
    pub trade_id: TradeId,
    pub entry: ActualFill,
    pub exits: Vec<ExecutedExit>,
    /// Share of the intended size actually held.
    pub realized_size: f64,
    /// Net return per unit held, after slippage and venue fees.
    pub net_return_pct: f64,
    /// Net PnL relative to the intended notional (`net_return_pct * realized_size`).
    pub net_pnl_pct: f64,
    pub log: Vec<LegAttempt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OverlayOutcome {
    Executed(ExecutedTrade),
    /// The entry attempt failed; no position was taken.
    EntryFailed {
        trade_id: TradeId,
        log: Vec<LegAttempt>,
    },
}

impl OverlayOutcome {
    pub fn log(&self) -> &[LegAttempt] {
        match self {
            OverlayOutcome::Executed(t) => &t.log,
            OverlayOutcome::EntryFailed { log, .. } => log,
        }
    }

    pub fn executed(&self) -> Option<&ExecutedTrade> {
        match self {
            OverlayOutcome::Executed(t) => Some(t),
            OverlayOutcome::EntryFailed { .. } => None,
        }
    }
}

pub struct TradeExecutor<'m> {
    model: &'m ExecutionModel,
    ctx: ExecutionContext,
    max_exit_retries: u32,
}

impl<'m> TradeExecutor<'m> {
    pub fn new(model: &'m ExecutionModel, ctx: ExecutionContext) -> Self {
        Self {
            model,
            ctx,
            max_exit_retries: DEFAULT_EXIT_RETRIES,
        }
    }

    pub fn with_exit_retries(mut self, retries: u32) -> Self {
        self.max_exit_retries = retries;
        self
    }

    /// Execute every leg of `trade` against `candles`.
    pub fn execute<R: Rng + ?Sized>(
        &self,
        trade: &TradeRecord,
        candles: &[Candle],
        rng: &mut R,
    ) -> OverlayOutcome {
        let mut log = Vec::new();

        let entry_timestamp = if trade.entry_trigger == EventReason::Signal {
            close_time(candles, trade.entry_index)
        } else {
            trade.entry_timestamp
        };
        let entry_ideal = IdealFill {
            side: Side::Buy,
            candle_index: trade.entry_index,
            timestamp: entry_timestamp,
            price: trade.entry_price,
        };
        let outcome = apply_friction(&entry_ideal, candles, self.model, &self.ctx, rng);
        log.push(LegAttempt {
            leg: LegKind::Entry,
            leg_index: 0,
            attempt: 0,
            outcome,
        });
        let entry = match outcome {
            FillOutcome::Filled(fill) => fill,
            FillOutcome::Failed(failed) => {
                trace!(trade = %trade.trade_id, p = failed.failure_probability, "entry attempt failed");
                return OverlayOutcome::EntryFailed {
                    trade_id: trade.trade_id,
                    log,
                };
            }
        };
        let realized_size = entry.fill_fraction;

        let exit_ctx = ExecutionContext {
            size: self.ctx.size * realized_size,
            ..self.ctx.without_partials()
        };
        let mut exits = Vec::with_capacity(trade.exits.len());
        for (leg_index, leg) in trade.exits.iter().enumerate() {
            let fill = if leg.reason == EventReason::StillOpen {
                None
            } else {
                let ideal = exit_ideal(leg, &entry, candles);
                Some(self.execute_exit(ideal, leg_index, candles, &exit_ctx, rng, &mut log))
            };
            exits.push(ExecutedExit {
                intended_size: leg.size,
                realized_size: leg.size * realized_size,
                reason: leg.reason,
                price: fill.map_or(leg.price, |f| f.price),
                fill,
            });
        }

        let gross: f64 = exits
            .iter()
            .map(|e| e.intended_size * (e.price / entry.price - 1.0))
            .sum();
        let exit_notional: f64 = exits.iter().map(|e| e.intended_size * e.price / entry.price).sum();
        let fees = (1.0 + exit_notional) * self.model.fee_bps / 10_000.0;
        let net_return_pct = gross - fees;

        OverlayOutcome::Executed(ExecutedTrade {
            trade_id: trade.trade_id,
            entry,
            exits,
            realized_size,
            net_return_pct,
            net_pnl_pct: net_return_pct * realized_size,
            log,
        })
    }

    /// Attempt one exit leg, retrying from each failed attempt's resolved
    /// time, and force it at the last resolved price when retries run out.
    fn execute_exit<R: Rng + ?Sized>(
        &self,
        mut ideal: IdealFill,
        leg_index: usize,
        candles: &[Candle],
        ctx: &ExecutionContext,
        rng: &mut R,
        log: &mut Vec<LegAttempt>,
    ) -> ActualFill {
        let mut attempt = 0;
        loop {
            let outcome = apply_friction(&ideal, candles, self.model, ctx, rng);
            log.push(LegAttempt {
                leg: LegKind::Exit,
                leg_index,
                attempt,
                outcome,
            });
            match outcome {
                FillOutcome::Filled(fill) => return fill,
                FillOutcome::Failed(failed) if attempt >= self.max_exit_retries => {
                    let slippage_bps = self.model.slippage.bps(ctx.size);
                    return ActualFill {
                        side: Side::Sell,
                        requested_index: failed.requested_index,
                        candle_index: failed.candle_index,
                        timestamp: failed.timestamp,
                        latency_ms: failed.latency_ms,
                        reference_price: failed.reference_price,
                        price: Side::Sell.slip(failed.reference_price, slippage_bps),
                        slippage_bps,
                        fill_fraction: 1.0,
                        forced: true,
                    };
                }
                FillOutcome::Failed(failed) => {
                    ideal = IdealFill {
                        side: Side::Sell,
                        candle_index: failed.candle_index,
                        timestamp: failed.timestamp,
                        price: failed.reference_price,
                    };
                    attempt += 1;
                }
            }
        }
    }
}

/// Where an exit leg is requested. A leg the simulator placed before the
/// delayed entry landed is moved onto the entry's candle and references
/// that candle's open.
fn exit_ideal(leg: &ExitFill, entry: &ActualFill, candles: &[Candle]) -> IdealFill {
    let timestamp = match leg.reason {
        EventReason::SignalExit | EventReason::TimeExit => close_time(candles, leg.candle_index),
        _ => leg.timestamp,
    };
    if leg.candle_index < entry.candle_index {
        return IdealFill {
            side: Side::Sell,
            candle_index: entry.candle_index,
            timestamp: entry.timestamp,
            price: candles[entry.candle_index].open,
        };
    }
    IdealFill {
        side: Side::Sell,
        candle_index: leg.candle_index,
        timestamp: timestamp.max(entry.timestamp),
        price: leg.price,
    }
}

/// Last millisecond covered by candle `index`. The final candle's span is
/// taken from the spacing of the two before it.
fn close_time(candles: &[Candle], index: usize) -> Timestamp {
    let open = candles[index].timestamp;
    let span = match (candles.get(index + 1), index.checked_sub(1)) {
        (Some(next), _) => next.timestamp.millis_since(open),
        (None, Some(prev)) => open.millis_since(candles[prev].timestamp),
        (None, None) => 0,
    };
    open.plus_millis((span - 1).max(0) as f64)
}
