//! Simulation event log, the system of record for a run.
//!
//! Events are append-only and strictly ordered. Trade records are derived
//! summaries; the log is what replay, visualization and tie-break audits read.

use serde::{Deserialize, Serialize};

use super::candle::Timestamp;
use super::ids::TradeId;

/// Closed set of event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    EntrySignalTrue,
    EntryFilled,
    TargetHit,
    PartialExit,
    StopHit,
    StopMoved,
    TimeExit,
    ExitFull,
}

/// Why an event happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventReason {
    Immediate,
    InitialDrop,
    TrailingEntry,
    Signal,
    StopLoss,
    TrailingStop,
    BreakEven,
    Target,
    TargetsDone,
    TimeExit,
    SignalExit,
    StillOpen,
}

/// Event payload. Fields not meaningful for a given kind are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub price: Option<f64>,
    /// Size affected by this event, as a fraction of the original position.
    pub size: Option<f64>,
    pub reason: Option<EventReason>,
    /// Remaining open size after this event.
    pub remaining: Option<f64>,
    /// Realized gross PnL so far, as a fraction of the original notional.
    pub running_pnl: Option<f64>,
    /// Ladder rung for target events.
    pub target_ordinal: Option<usize>,
}

impl EventPayload {
    pub fn empty() -> Self {
        Self {
            price: None,
            size: None,
            reason: None,
            remaining: None,
            running_pnl: None,
            target_ordinal: None,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_reason(mut self, reason: EventReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_remaining(mut self, remaining: f64) -> Self {
        self.remaining = Some(remaining);
        self
    }

    pub fn with_running_pnl(mut self, pnl: f64) -> Self {
        self.running_pnl = Some(pnl);
        self
    }

    pub fn with_target(mut self, ordinal: usize) -> Self {
        self.target_ordinal = Some(ordinal);
        self
    }
}

/// One log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    /// Position in the log (0-based, gap-free).
    pub seq: u64,
    pub timestamp: Timestamp,
    pub candle_index: usize,
    pub trade_id: Option<TradeId>,
    pub kind: EventKind,
    pub payload: EventPayload,
}

/// Append-only event buffer owned by a single run.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<SimulationEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    ///
    /// # Panics
    /// If `timestamp` precedes the previous event's timestamp or the candle
    /// index moves backwards.
    pub fn push(
        &mut self,
        timestamp: Timestamp,
        candle_index: usize,
        trade_id: Option<TradeId>,
        kind: EventKind,
        payload: EventPayload,
    ) {
        if let Some(last) = self.events.last() {
            assert!(
                timestamp >= last.timestamp,
                "event timestamp moved backwards: {} after {}",
                timestamp,
                last.timestamp
            );
            assert!(
                candle_index >= last.candle_index,
                "event candle index moved backwards: {candle_index} after {}",
                last.candle_index
            );
        }
        let seq = self.events.len() as u64;
        self.events.push(SimulationEvent {
            seq,
            timestamp,
            candle_index,
            trade_id,
            kind,
            payload,
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimulationEvent> {
        self.events.iter()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    pub fn into_vec(self) -> Vec<SimulationEvent> {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_are_gap_free() {
        let mut log = EventLog::new();
        log.push(Timestamp::from_secs(1), 0, None, EventKind::EntrySignalTrue, EventPayload::empty());
        log.push(Timestamp::from_secs(1), 0, Some(TradeId(1)), EventKind::EntryFilled, EventPayload::empty());
        log.push(Timestamp::from_secs(2), 1, Some(TradeId(1)), EventKind::ExitFull, EventPayload::empty());
        let seqs: Vec<u64> = log.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(log.count(EventKind::EntryFilled), 1);
    }

    #[test]
    #[should_panic(expected = "moved backwards")]
    fn backwards_timestamp_panics() {
        let mut log = EventLog::new();
        log.push(Timestamp::from_secs(5), 0, None, EventKind::EntryFilled, EventPayload::empty());
        log.push(Timestamp::from_secs(4), 1, None, EventKind::ExitFull, EventPayload::empty());
    }

    #[test]
    fn kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&EventKind::StopHit).unwrap();
        assert_eq!(json, "\"STOP_HIT\"");
        let json = serde_json::to_string(&EventReason::TimeExit).unwrap();
        assert_eq!(json, "\"time_exit\"");
    }
}
