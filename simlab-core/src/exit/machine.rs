//! Exit/position state machine.
//!
//! One forward pass over candles from the entry. Per candle, in order:
//!
//! 1. stop check against the low, and ladder targets against the high,
//!    ordered by the [`TieBreakPolicy`] (stop first by default)
//! 2. break-even promotion after the first target fill
//! 3. trailing-stop activation and ratchet
//! 4. exit signal, at close
//! 5. time exit, at close
//!
//! Each transition appends one event. The machine owns its `Position`;
//! nothing else mutates it.

use crate::domain::{
    Candle, EventKind, EventLog, EventPayload, EventReason, ExitFill, ExitReason, Position,
    Timestamp, TradeRecord,
};
use crate::fees::FeeConfig;
use crate::signals::{evaluate, EvalContext};

use super::config::CompiledExit;
use super::tie_break::TieBreakPolicy;

/// Where the current stop level came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopOrigin {
    Initial,
    BreakEven,
    Trailing,
}

impl StopOrigin {
    fn reason(self) -> EventReason {
        match self {
            StopOrigin::Initial => EventReason::StopLoss,
            StopOrigin::BreakEven => EventReason::BreakEven,
            StopOrigin::Trailing => EventReason::TrailingStop,
        }
    }
}

/// Result of one candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Holding,
    Closed(ExitReason),
}

pub struct ExitStateMachine<'a> {
    config: &'a CompiledExit,
    tie_break: TieBreakPolicy,
    position: Position,
    stop_origin: StopOrigin,
    exits: Vec<ExitFill>,
    realized_pnl: f64,
    max_high: f64,
    min_low: f64,
    closed: Option<ExitReason>,
}

impl<'a> ExitStateMachine<'a> {
    pub fn new(config: &'a CompiledExit, position: Position) -> Self {
        let entry = position.entry_price;
        Self {
            config,
            tie_break: config.tie_break,
            position,
            stop_origin: StopOrigin::Initial,
            exits: Vec::new(),
            realized_pnl: 0.0,
            max_high: entry,
            min_low: entry,
            closed: None,
        }
    }

    /// Override the configured tie-break policy for this run.
    pub fn with_tie_break(mut self, tie_break: TieBreakPolicy) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// Process one candle. `signal_ctx` is the evaluation context for the
    /// exit signal on this candle; pass `None` when no exit signal applies.
    ///
    /// # Panics
    /// If called after the position has closed.
    pub fn step(
        &mut self,
        index: usize,
        candle: &Candle,
        signal_ctx: Option<EvalContext<'_>>,
        log: &mut EventLog,
    ) -> StepOutcome {
        assert!(
            self.closed.is_none(),
            "exit step on closed position {}",
            self.position.trade_id
        );

        self.max_high = self.max_high.max(candle.high);
        self.min_low = self.min_low.min(candle.low);

        let first_pass: [fn(&mut Self, usize, &Candle, &mut EventLog) -> StepOutcome; 2] =
            if self.tie_break.stop_first(candle) {
                [Self::check_stop, Self::check_targets]
            } else {
                [Self::check_targets, Self::check_stop]
            };
        for check in first_pass {
            if let closed @ StepOutcome::Closed(_) = check(self, index, candle, log) {
                return closed;
            }
        }

        self.update_trailing(index, candle, log);

        let config = self.config;
        if let (Some(node), Some(ctx)) = (&config.exit_signal, signal_ctx) {
            if evaluate(node, &ctx).satisfied {
                return self.exit_remaining(index, candle.timestamp, candle.close, EventReason::SignalExit, log);
            }
        }

        if let Some(time_exit) = config.time_exit {
            let held = index.saturating_sub(self.position.entry_index);
            if held >= time_exit.max_candles {
                log.push(
                    candle.timestamp,
                    index,
                    Some(self.position.trade_id),
                    EventKind::TimeExit,
                    EventPayload::empty()
                        .with_price(candle.close)
                        .with_reason(EventReason::TimeExit),
                );
                return self.exit_remaining(index, candle.timestamp, candle.close, EventReason::TimeExit, log);
            }
        }

        StepOutcome::Holding
    }

    /// Mark the trade still open at the last candle's close. Not a trigger:
    /// the data simply ran out.
    pub fn close_still_open(&mut self, index: usize, candle: &Candle, log: &mut EventLog) -> StepOutcome {
        assert!(
            self.closed.is_none(),
            "still-open marker on closed position {}",
            self.position.trade_id
        );
        self.exit_remaining(index, candle.timestamp, candle.close, EventReason::StillOpen, log)
    }

    fn check_stop(&mut self, index: usize, candle: &Candle, log: &mut EventLog) -> StepOutcome {
        let Some(stop) = self.position.stop_price() else {
            return StepOutcome::Holding;
        };
        if candle.low > stop {
            return StepOutcome::Holding;
        }

        // Gap through the stop fills at the open, the first price available.
        let fill = stop.min(candle.open);
        let reason = self.stop_origin.reason();
        log.push(
            candle.timestamp,
            index,
            Some(self.position.trade_id),
            EventKind::StopHit,
            EventPayload::empty()
                .with_price(fill)
                .with_reason(reason)
                .with_remaining(self.position.remaining_size()),
        );
        self.exit_remaining(index, candle.timestamp, fill, reason, log)
    }

    fn check_targets(&mut self, index: usize, candle: &Candle, log: &mut EventLog) -> StepOutcome {
        while let Some(target) = self.position.targets_remaining.first().copied() {
            if candle.high < target.price {
                break;
            }
            self.position.targets_remaining.remove(0);

            // A ladder summing below 1.0 leaves the remainder riding.
            let size = self.position.reduce(target.size);

            log.push(
                candle.timestamp,
                index,
                Some(self.position.trade_id),
                EventKind::TargetHit,
                EventPayload::empty()
                    .with_price(target.price)
                    .with_target(target.ordinal)
                    .with_reason(EventReason::Target),
            );
            self.record_leg(index, candle.timestamp, target.price, size, EventReason::Target);
            self.position.targets_hit += 1;
            log.push(
                candle.timestamp,
                index,
                Some(self.position.trade_id),
                EventKind::PartialExit,
                EventPayload::empty()
                    .with_price(target.price)
                    .with_size(size)
                    .with_target(target.ordinal)
                    .with_remaining(self.position.remaining_size())
                    .with_running_pnl(self.realized_pnl),
            );

            if self.position.is_closed() {
                return self.finish(index, candle.timestamp, target.price, EventReason::TargetsDone, log);
            }

            if self.position.targets_hit == 1 && self.config.break_even_after_first_target {
                if let Some(stop) = self.position.promote_break_even() {
                    self.stop_origin = StopOrigin::BreakEven;
                    log.push(
                        candle.timestamp,
                        index,
                        Some(self.position.trade_id),
                        EventKind::StopMoved,
                        EventPayload::empty()
                            .with_price(stop)
                            .with_reason(EventReason::BreakEven),
                    );
                }
            }
        }
        StepOutcome::Holding
    }

    fn update_trailing(&mut self, index: usize, candle: &Candle, log: &mut EventLog) {
        self.position.highest_since_entry = self.position.highest_since_entry.max(candle.high);

        let Some(trailing) = self.config.trailing_stop else {
            return;
        };
        if !self.position.trailing_active
            && self.position.return_at(candle.high) >= trailing.activation_pct
        {
            self.position.trailing_active = true;
        }
        if !self.position.trailing_active {
            return;
        }

        let proposed = self.position.highest_since_entry * (1.0 - trailing.trail_pct);
        if let Some(stop) = self.position.tighten_stop(proposed) {
            self.stop_origin = StopOrigin::Trailing;
            log.push(
                candle.timestamp,
                index,
                Some(self.position.trade_id),
                EventKind::StopMoved,
                EventPayload::empty()
                    .with_price(stop)
                    .with_reason(EventReason::TrailingStop),
            );
        }
    }

    fn exit_remaining(
        &mut self,
        index: usize,
        timestamp: Timestamp,
        price: f64,
        reason: EventReason,
        log: &mut EventLog,
    ) -> StepOutcome {
        let size = self.position.close_all();
        self.record_leg(index, timestamp, price, size, reason);
        self.finish(index, timestamp, price, reason, log)
    }

    fn finish(
        &mut self,
        index: usize,
        timestamp: Timestamp,
        price: f64,
        reason: EventReason,
        log: &mut EventLog,
    ) -> StepOutcome {
        log.push(
            timestamp,
            index,
            Some(self.position.trade_id),
            EventKind::ExitFull,
            EventPayload::empty()
                .with_price(price)
                .with_reason(reason)
                .with_remaining(0.0)
                .with_running_pnl(self.realized_pnl),
        );
        let exit_reason = exit_reason_for(reason);
        self.closed = Some(exit_reason);
        StepOutcome::Closed(exit_reason)
    }

    fn record_leg(&mut self, index: usize, timestamp: Timestamp, price: f64, size: f64, reason: EventReason) {
        if size <= 0.0 {
            return;
        }
        self.realized_pnl += size * self.position.return_at(price);
        self.exits.push(ExitFill {
            candle_index: index,
            timestamp,
            price,
            size,
            reason,
        });
    }

    /// Summarise the closed trade.
    ///
    /// # Panics
    /// If the position is still open.
    pub fn into_record(self, entry_trigger: EventReason, fees: &FeeConfig) -> TradeRecord {
        let exit_reason = self
            .closed
            .unwrap_or_else(|| panic!("trade {} summarised while open", self.position.trade_id));
        let entry = self.position.entry_price;

        let exited: f64 = self.exits.iter().map(|e| e.size).sum();
        let exit_price = if exited > 0.0 {
            self.exits.iter().map(|e| e.size * e.price).sum::<f64>() / exited
        } else {
            entry
        };
        let (exit_index, exit_timestamp) = self
            .exits
            .last()
            .map(|e| (e.candle_index, e.timestamp))
            .unwrap_or((self.position.entry_index, self.position.entry_timestamp));

        let costs = fees.round_trip(entry, &self.exits);
        let gross = self.realized_pnl;

        TradeRecord {
            trade_id: self.position.trade_id,
            entry_index: self.position.entry_index,
            entry_timestamp: self.position.entry_timestamp,
            entry_price: entry,
            entry_trigger,
            exit_index,
            exit_timestamp,
            exit_price,
            exit_reason,
            candles_held: exit_index - self.position.entry_index,
            gross_pnl_pct: gross,
            net_pnl_pct: gross - costs.total(),
            costs,
            mfe_pct: (self.max_high / entry - 1.0).max(0.0),
            mae_pct: (self.min_low / entry - 1.0).min(0.0),
            exits: self.exits,
        }
    }
}

fn exit_reason_for(reason: EventReason) -> ExitReason {
    match reason {
        EventReason::StopLoss => ExitReason::Stop,
        EventReason::BreakEven => ExitReason::BreakEvenStop,
        EventReason::TrailingStop => ExitReason::TrailingStop,
        EventReason::TimeExit => ExitReason::TimeExit,
        EventReason::SignalExit => ExitReason::SignalExit,
        EventReason::StillOpen => ExitReason::StillOpen,
        _ => ExitReason::TargetsDone,
    }
}
