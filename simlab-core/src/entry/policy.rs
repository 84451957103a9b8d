//! Entry policy state machine.
//!
//! From a start index the scanner advances one candle per step until a
//! trigger confirms or the wait window runs out:
//!
//! ```text
//! Waiting ──trigger (+ signal, if configured)──▶ Confirmed
//!    │
//!    └──window exhausted / data exhausted──────▶ Expired(reason)
//! ```
//!
//! Trigger priority on a single candle: immediate, initial-drop, trailing,
//! signal-only. When an entry signal is configured next to a price trigger,
//! the signal must also hold on the candle where the price trigger fires.

use serde::{Deserialize, Serialize};

use crate::domain::{Candle, EventReason, Timestamp};
use crate::indicators::IndicatorSnapshot;
use crate::signals::{evaluate, EvalContext, SignalNode, SignalOutcome};

use super::config::{CompiledEntry, MaxWait};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryTrigger {
    Immediate,
    InitialDrop,
    Trailing,
    Signal,
}

impl EntryTrigger {
    pub fn reason(self) -> EventReason {
        match self {
            EntryTrigger::Immediate => EventReason::Immediate,
            EntryTrigger::InitialDrop => EventReason::InitialDrop,
            EntryTrigger::Trailing => EventReason::TrailingEntry,
            EntryTrigger::Signal => EventReason::Signal,
        }
    }

    /// True if the fill happens at the candle's close, after its range has
    /// already printed.
    pub fn fills_at_close(self) -> bool {
        matches!(self, EntryTrigger::Signal)
    }
}

/// A confirmed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFill {
    pub index: usize,
    pub timestamp: Timestamp,
    pub price: f64,
    pub trigger: EntryTrigger,
    /// Signal evaluation on the confirming candle, if a signal is configured.
    pub signal: Option<SignalOutcome>,
}

/// Why no entry was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    /// A price trigger was configured but never reached.
    PriceNeverTriggered,
    /// Signal-only entry whose signal was never satisfied.
    SignalNeverTrue,
    /// The price trigger fired, but the entry signal was false every time.
    SignalRejectedPriceTrigger,
    /// The start index lies beyond the candle data.
    NoData,
}

impl ExpiryReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExpiryReason::PriceNeverTriggered => "price_never_triggered",
            ExpiryReason::SignalNeverTrue => "signal_never_true",
            ExpiryReason::SignalRejectedPriceTrigger => "signal_rejected_price_trigger",
            ExpiryReason::NoData => "no_data",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryState {
    Waiting,
    Confirmed(EntryFill),
    Expired(ExpiryReason),
}

/// One scan for an entry.
#[derive(Debug)]
pub struct EntryScanner<'a> {
    entry: &'a CompiledEntry,
    candles: &'a [Candle],
    snapshots: &'a [IndicatorSnapshot],
    start: usize,
    next: usize,
    running_low: Option<f64>,
    price_fired: bool,
    state: EntryState,
}

impl<'a> EntryScanner<'a> {
    /// `snapshots` must be aligned with `candles` (one per index).
    pub fn new(
        entry: &'a CompiledEntry,
        candles: &'a [Candle],
        snapshots: &'a [IndicatorSnapshot],
        start: usize,
    ) -> Self {
        debug_assert_eq!(candles.len(), snapshots.len());
        let state = if start >= candles.len() {
            EntryState::Expired(ExpiryReason::NoData)
        } else {
            EntryState::Waiting
        };
        Self {
            entry,
            candles,
            snapshots,
            start,
            next: start,
            running_low: None,
            price_fired: false,
            state,
        }
    }

    pub fn state(&self) -> &EntryState {
        &self.state
    }

    /// Advance by one candle.
    pub fn step(&mut self) -> &EntryState {
        if !matches!(self.state, EntryState::Waiting) {
            return &self.state;
        }

        let index = self.next;
        if index >= self.candles.len() || !self.within_window(index) {
            self.state = EntryState::Expired(self.expiry_reason());
            return &self.state;
        }
        self.next += 1;

        let entry = self.entry;
        let candle = self.candles[index];

        if entry.is_immediate() {
            self.confirm(index, candle.open, EntryTrigger::Immediate, None);
            return &self.state;
        }

        if entry.has_price_trigger() {
            let fired = self.price_trigger(&candle);
            self.running_low = Some(self.running_low.map_or(candle.low, |low| low.min(candle.low)));

            if let Some((trigger, price)) = fired {
                self.price_fired = true;
                match &entry.signal {
                    None => self.confirm(index, price, trigger, None),
                    Some(node) => {
                        let outcome = self.evaluate_signal(node, index);
                        if outcome.satisfied {
                            self.confirm(index, price, trigger, Some(outcome));
                        }
                    }
                }
            }
        } else if let Some(node) = &entry.signal {
            let outcome = self.evaluate_signal(node, index);
            if outcome.satisfied {
                self.confirm(index, candle.close, EntryTrigger::Signal, Some(outcome));
            }
        }

        &self.state
    }

    /// Step until the scan leaves `Waiting`.
    pub fn run(mut self) -> EntryState {
        while matches!(self.step(), EntryState::Waiting) {}
        self.state
    }

    fn within_window(&self, index: usize) -> bool {
        match self.entry.max_wait {
            MaxWait::Candles(n) => index - self.start <= n,
            MaxWait::Minutes(m) => {
                let elapsed = self.candles[index]
                    .timestamp
                    .millis_since(self.candles[self.start].timestamp);
                elapsed <= (m as i64).saturating_mul(60_000)
            }
        }
    }

    fn price_trigger(&self, candle: &Candle) -> Option<(EntryTrigger, f64)> {
        if let Some(drop) = self.entry.initial_drop {
            let level = self.candles[self.start].open * (1.0 + drop);
            if candle.low <= level {
                return Some((EntryTrigger::InitialDrop, level));
            }
        }
        if let (Some(rebound), Some(low)) = (self.entry.trailing_rebound, self.running_low) {
            // running_low excludes this candle: its own low may print after its high.
            let level = low * (1.0 + rebound);
            if candle.high >= level {
                return Some((EntryTrigger::Trailing, level));
            }
        }
        None
    }

    fn evaluate_signal(&self, node: &SignalNode, index: usize) -> SignalOutcome {
        let ctx = EvalContext {
            candle: &self.candles[index],
            indicators: &self.snapshots[index],
            prev_indicators: index.checked_sub(1).map(|p| &self.snapshots[p]),
        };
        evaluate(node, &ctx)
    }

    fn confirm(&mut self, index: usize, price: f64, trigger: EntryTrigger, signal: Option<SignalOutcome>) {
        self.state = EntryState::Confirmed(EntryFill {
            index,
            timestamp: self.candles[index].timestamp,
            price,
            trigger,
            signal,
        });
    }

    fn expiry_reason(&self) -> ExpiryReason {
        if !self.entry.has_price_trigger() {
            ExpiryReason::SignalNeverTrue
        } else if self.price_fired {
            ExpiryReason::SignalRejectedPriceTrigger
        } else {
            ExpiryReason::PriceNeverTriggered
        }
    }
}

/// Scan forward from `start` for an entry.
pub fn find_entry(
    entry: &CompiledEntry,
    candles: &[Candle],
    snapshots: &[IndicatorSnapshot],
    start: usize,
) -> EntryState {
    EntryScanner::new(entry, candles, snapshots, start).run()
}
