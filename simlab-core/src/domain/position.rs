//! Open position state for one simulation run.
//!
//! A `Position` is owned by exactly one run and mutated once per candle by the
//! exit state machine. Two invariants are enforced with panics because a
//! violation means the simulator itself is wrong, not the input:
//!
//! - remaining size stays within [0, 1] (fractions of the original size)
//! - the stop only ever tightens (ratchet); the single break-even promotion is
//!   the one explicitly allowed jump

use serde::{Deserialize, Serialize};

use super::candle::Timestamp;
use super::ids::TradeId;

/// Tolerance under which a remaining size is treated as fully closed.
pub const SIZE_EPSILON: f64 = 1e-9;

/// One not-yet-filled rung of the profit ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingTarget {
    /// Position of this rung in the configured ladder (0-based).
    pub ordinal: usize,
    /// Absolute trigger price.
    pub price: f64,
    /// Size to close, as a fraction of the original position.
    pub size: f64,
}

/// Mutable long position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub trade_id: TradeId,
    pub entry_price: f64,
    pub entry_timestamp: Timestamp,
    pub entry_index: usize,
    /// Fraction of the original size still open (1.0 at entry).
    remaining_size: f64,
    /// Current protective stop, if any.
    stop_price: Option<f64>,
    /// Ladder rungs still waiting to fill, ascending by price.
    pub targets_remaining: Vec<PendingTarget>,
    /// Highest high observed since entry (trailing reference).
    pub highest_since_entry: f64,
    pub trailing_active: bool,
    pub break_even_applied: bool,
    pub targets_hit: usize,
}

impl Position {
    pub fn open(
        trade_id: TradeId,
        entry_price: f64,
        entry_timestamp: Timestamp,
        entry_index: usize,
        initial_stop: Option<f64>,
        targets: Vec<PendingTarget>,
    ) -> Self {
        assert!(
            entry_price.is_finite() && entry_price > 0.0,
            "position opened at invalid price {entry_price}"
        );
        Self {
            trade_id,
            entry_price,
            entry_timestamp,
            entry_index,
            remaining_size: 1.0,
            stop_price: initial_stop,
            targets_remaining: targets,
            highest_since_entry: entry_price,
            trailing_active: false,
            break_even_applied: false,
            targets_hit: 0,
        }
    }

    pub fn remaining_size(&self) -> f64 {
        self.remaining_size
    }

    pub fn stop_price(&self) -> Option<f64> {
        self.stop_price
    }

    pub fn is_closed(&self) -> bool {
        self.remaining_size <= SIZE_EPSILON
    }

    /// Unrealized return of `price` relative to entry, as a fraction.
    pub fn return_at(&self, price: f64) -> f64 {
        price / self.entry_price - 1.0
    }

    /// Close up to `size` of the original position. Returns the size actually
    /// closed, clamped so remaining size never drops below zero.
    pub fn reduce(&mut self, size: f64) -> f64 {
        assert!(size >= 0.0, "negative exit size {size}");
        assert!(
            self.remaining_size >= -SIZE_EPSILON,
            "remaining size went negative: {}",
            self.remaining_size
        );
        let closed = size.min(self.remaining_size);
        self.remaining_size -= closed;
        if self.remaining_size <= SIZE_EPSILON {
            self.remaining_size = 0.0;
        }
        closed
    }

    /// Close whatever remains. Returns the size closed.
    pub fn close_all(&mut self) -> f64 {
        let remaining = self.remaining_size;
        self.reduce(remaining)
    }

    /// Ratchet the stop toward `proposed`. Returns the new stop if it moved.
    ///
    /// A proposal below the current stop is ignored (stops never loosen).
    pub fn tighten_stop(&mut self, proposed: f64) -> Option<f64> {
        assert!(proposed.is_finite(), "non-finite stop proposal {proposed}");
        match self.stop_price {
            Some(current) if proposed <= current => None,
            _ => {
                self.set_stop(proposed);
                Some(proposed)
            }
        }
    }

    /// Move the stop to the entry price after the first ladder fill.
    ///
    /// Returns the new stop if it moved. May only happen once per position.
    pub fn promote_break_even(&mut self) -> Option<f64> {
        assert!(
            !self.break_even_applied,
            "break-even promotion applied twice to {}",
            self.trade_id
        );
        self.break_even_applied = true;
        self.tighten_stop(self.entry_price)
    }

    fn set_stop(&mut self, stop: f64) {
        if let Some(current) = self.stop_price {
            assert!(
                stop >= current,
                "stop loosened on {}: {current} -> {stop}",
                self.trade_id
            );
        }
        self.stop_price = Some(stop);
    }
}
