//! Single-run simulator: one strategy over one token's candles.
//!
//! ```text
//! candles ─▶ IndicatorEngine ─▶ EntryScanner ─▶ ExitStateMachine ─▶ RunOutcome
//!                                      │                 │
//!                                      └──── EventLog ◀──┘
//! ```
//!
//! Pure and single-threaded: no I/O, no shared state. Data-sufficiency
//! problems come back as a [`RunStatus`], never as an error.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::domain::{
    Candle, EventKind, EventLog, EventPayload, IdGen, Position, SimulationEvent, TradeRecord,
};
use crate::entry::{find_entry, EntryFill, EntryState, ExpiryReason};
use crate::exit::{ExitStateMachine, StepOutcome, TieBreakPolicy};
use crate::indicators::IndicatorSnapshot;
use crate::signals::EvalContext;
use crate::strategy::CompiledStrategy;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Entered and fully exited.
    Completed,
    /// Entered; the data ran out with size still open.
    StillOpen,
    /// No entry within the wait window.
    EntryExpired { reason: ExpiryReason },
    /// Too few candles for the strategy's indicators to warm up.
    InsufficientData { required: usize, available: usize },
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::StillOpen => "still_open",
            RunStatus::EntryExpired { .. } => "entry_expired",
            RunStatus::InsufficientData { .. } => "insufficient_data",
        }
    }

    pub fn has_trade(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::StillOpen)
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub trade: Option<TradeRecord>,
    pub events: Vec<SimulationEvent>,
}

impl RunOutcome {
    fn without_trade(status: RunStatus) -> Self {
        Self {
            status,
            trade: None,
            events: Vec::new(),
        }
    }
}

pub struct Simulator<'s> {
    strategy: &'s CompiledStrategy,
    tie_break: Option<TieBreakPolicy>,
}

impl<'s> Simulator<'s> {
    pub fn new(strategy: &'s CompiledStrategy) -> Self {
        Self {
            strategy,
            tie_break: None,
        }
    }

    /// Override the strategy's tie-break policy.
    pub fn with_tie_break(mut self, tie_break: Option<TieBreakPolicy>) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Run from the first candle.
    pub fn run(&self, candles: &[Candle]) -> RunOutcome {
        self.run_from(candles, 0)
    }

    /// Run with the entry scan starting at `start`. Candles before `start`
    /// still feed indicator history.
    pub fn run_from(&self, candles: &[Candle], start: usize) -> RunOutcome {
        let strategy = self.strategy;
        let required = strategy.engine.lookback() + 1;
        if candles.len() < required {
            debug!(
                strategy = %strategy.name,
                required,
                available = candles.len(),
                "insufficient candles for indicator warmup"
            );
            return RunOutcome::without_trade(RunStatus::InsufficientData {
                required,
                available: candles.len(),
            });
        }

        let snapshots = strategy.engine.compute_series(candles);

        let fill = match find_entry(&strategy.entry, candles, &snapshots, start) {
            EntryState::Confirmed(fill) => fill,
            EntryState::Expired(reason) => {
                debug!(strategy = %strategy.name, reason = reason.as_str(), "entry expired");
                return RunOutcome::without_trade(RunStatus::EntryExpired { reason });
            }
            EntryState::Waiting => {
                unreachable!("entry scan returned while still waiting")
            }
        };

        let mut log = EventLog::new();
        let mut ids = IdGen::default();
        let trade_id = ids.next_trade_id();
        log_entry(&mut log, &fill, trade_id, candles);

        let entry_price = fill.price;
        let position = Position::open(
            trade_id,
            entry_price,
            fill.timestamp,
            fill.index,
            strategy.exit.initial_stop(entry_price),
            strategy.exit.ladder(entry_price),
        );

        let mut machine = ExitStateMachine::new(&strategy.exit, position);
        if let Some(tie_break) = self.tie_break {
            machine = machine.with_tie_break(tie_break);
        }

        // A close fill has already seen its candle's range.
        let first = if fill.trigger.fills_at_close() {
            fill.index + 1
        } else {
            fill.index
        };

        for index in first..candles.len() {
            let ctx = strategy
                .exit
                .exit_signal
                .as_ref()
                .map(|_| signal_context(candles, &snapshots, index));
            if let StepOutcome::Closed(reason) = machine.step(index, &candles[index], ctx, &mut log) {
                trace!(trade = %trade_id, index, reason = reason.as_str(), "position closed");
                break;
            }
        }

        if !machine.is_closed() {
            let last = candles.len() - 1;
            machine.close_still_open(last, &candles[last], &mut log);
        }

        let trade = machine.into_record(fill.trigger.reason(), &strategy.fees);
        let status = if trade.is_open() {
            RunStatus::StillOpen
        } else {
            RunStatus::Completed
        };

        debug!(
            strategy = %strategy.name,
            status = status.as_str(),
            exit_reason = trade.exit_reason.as_str(),
            net_pnl_pct = trade.net_pnl_pct,
            events = log.len(),
            "run finished"
        );

        RunOutcome {
            status,
            trade: Some(trade),
            events: log.into_vec(),
        }
    }
}

fn signal_context<'c>(
    candles: &'c [Candle],
    snapshots: &'c [IndicatorSnapshot],
    index: usize,
) -> EvalContext<'c> {
    EvalContext {
        candle: &candles[index],
        indicators: &snapshots[index],
        prev_indicators: index.checked_sub(1).map(|p| &snapshots[p]),
    }
}

fn log_entry(log: &mut EventLog, fill: &EntryFill, trade_id: crate::domain::TradeId, candles: &[Candle]) {
    let candle = &candles[fill.index];
    if fill.signal.is_some() {
        log.push(
            candle.timestamp,
            fill.index,
            Some(trade_id),
            EventKind::EntrySignalTrue,
            EventPayload::empty()
                .with_price(candle.close)
                .with_reason(crate::domain::EventReason::Signal),
        );
    }
    log.push(
        fill.timestamp,
        fill.index,
        Some(trade_id),
        EventKind::EntryFilled,
        EventPayload::empty()
            .with_price(fill.price)
            .with_size(1.0)
            .with_remaining(1.0)
            .with_reason(fill.trigger.reason()),
    );
}

/// Compile-free convenience: run `strategy` over `candles` from index 0.
pub fn simulate(strategy: &CompiledStrategy, candles: &[Candle]) -> RunOutcome {
    Simulator::new(strategy).run(candles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExitReason, Timestamp};
    use crate::exit::ProfitTarget;
    use crate::indicators::{IndicatorKind, IndicatorSpec};
    use crate::signals::{Comparison, SignalCondition, SignalGroupConfig};
    use crate::strategy::StrategyConfig;

    fn candle(i: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(Timestamp::from_secs(60 * i), o, h, l, c, 1.0)
    }

    #[test]
    fn insufficient_data_is_a_status() {
        let mut cfg = StrategyConfig::new("warm");
        cfg.indicators = vec![IndicatorSpec::new("rsi", IndicatorKind::Rsi { period: 14 })];
        let compiled = cfg.compile().unwrap();
        let candles: Vec<Candle> = (0..10).map(|i| candle(i, 1.0, 1.1, 0.9, 1.0)).collect();
        let outcome = simulate(&compiled, &candles);
        assert_eq!(
            outcome.status,
            RunStatus::InsufficientData {
                required: 15,
                available: 10
            }
        );
        assert!(outcome.trade.is_none());
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn empty_candles_are_insufficient() {
        let compiled = StrategyConfig::new("empty").compile().unwrap();
        assert!(matches!(
            simulate(&compiled, &[]).status,
            RunStatus::InsufficientData { required: 1, available: 0 }
        ));
    }

    #[test]
    fn signal_entry_logs_signal_then_fill_and_skips_entry_candle() {
        let mut cfg = StrategyConfig::new("sig");
        cfg.indicators = vec![IndicatorSpec::new("price", IndicatorKind::Price)];
        cfg.entry.signal = Some(SignalGroupConfig::all(vec![SignalCondition::new(
            "price",
            Comparison::Gt,
            1.5,
        )]));
        cfg.exit.targets = vec![ProfitTarget::new(1.0, 0.10)];
        let compiled = cfg.compile().unwrap();
        let candles = vec![
            candle(0, 1.0, 1.1, 0.9, 1.0),
            // signal true at close 2.0; the high of this candle must not fill the target
            candle(1, 1.0, 3.0, 1.0, 2.0),
            candle(2, 2.0, 2.3, 2.0, 2.25),
        ];
        let outcome = simulate(&compiled, &candles);
        let kinds: Vec<EventKind> = outcome.events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds[0], EventKind::EntrySignalTrue);
        assert_eq!(kinds[1], EventKind::EntryFilled);
        let trade = outcome.trade.unwrap();
        assert_eq!(trade.entry_price, 2.0);
        assert_eq!(trade.exit_index, 2);
        assert_eq!(trade.exit_reason, ExitReason::TargetsDone);
    }

    #[test]
    fn expiry_reported_without_trade() {
        let mut cfg = StrategyConfig::new("never");
        cfg.indicators = vec![IndicatorSpec::new("price", IndicatorKind::Price)];
        cfg.entry.signal = Some(SignalGroupConfig::all(vec![SignalCondition::new(
            "price",
            Comparison::Gt,
            100.0,
        )]));
        let compiled = cfg.compile().unwrap();
        let candles: Vec<Candle> = (0..5).map(|i| candle(i, 1.0, 1.1, 0.9, 1.0)).collect();
        assert_eq!(
            simulate(&compiled, &candles).status,
            RunStatus::EntryExpired {
                reason: ExpiryReason::SignalNeverTrue
            }
        );
    }

    #[test]
    fn tie_break_override_applies() {
        let mut cfg = StrategyConfig::new("tie");
        cfg.exit.targets = vec![ProfitTarget::new(1.0, 0.10)];
        cfg.exit.stop_loss_pct = Some(0.10);
        let compiled = cfg.compile().unwrap();
        let candles = vec![candle(0, 1.0, 1.2, 0.8, 1.0)];

        let default = simulate(&compiled, &candles).trade.unwrap();
        assert_eq!(default.exit_reason, ExitReason::Stop);

        let optimistic = Simulator::new(&compiled)
            .with_tie_break(Some(TieBreakPolicy::Optimistic))
            .run(&candles)
            .trade
            .unwrap();
        assert_eq!(optimistic.exit_reason, ExitReason::TargetsDone);
    }
}
