//! TradeRecord: summary of one completed (or still open) position.

use serde::{Deserialize, Serialize};

use super::candle::Timestamp;
use super::event::EventReason;
use super::ids::TradeId;

/// Why the position finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Every ladder rung filled.
    TargetsDone,
    /// Initial stop-loss hit.
    Stop,
    /// Stop hit after being promoted to break-even.
    BreakEvenStop,
    /// Stop hit after the trailing stop raised it.
    TrailingStop,
    TimeExit,
    SignalExit,
    /// Candles ran out with size still open; marked at the final close.
    StillOpen,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TargetsDone => "targets_done",
            ExitReason::Stop => "stop",
            ExitReason::BreakEvenStop => "break_even_stop",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::TimeExit => "time_exit",
            ExitReason::SignalExit => "signal_exit",
            ExitReason::StillOpen => "still_open",
        }
    }
}

/// One exit leg (partial or final).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitFill {
    pub candle_index: usize,
    pub timestamp: Timestamp,
    pub price: f64,
    /// Fraction of the original position closed by this leg.
    pub size: f64,
    pub reason: EventReason,
}

/// Cost breakdown in fractions of the original notional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub fees: f64,
    pub slippage: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.fees + self.slippage
    }
}

/// Complete trade summary derived from the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: TradeId,

    // ── Entry ──
    pub entry_index: usize,
    pub entry_timestamp: Timestamp,
    pub entry_price: f64,
    pub entry_trigger: EventReason,

    // ── Exit ──
    pub exit_index: usize,
    pub exit_timestamp: Timestamp,
    /// Size-weighted average exit price across all legs.
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub exits: Vec<ExitFill>,

    // ── Duration ──
    pub candles_held: usize,

    // ── PnL (fractions, 10% = 0.10) ──
    pub gross_pnl_pct: f64,
    pub costs: CostBreakdown,
    pub net_pnl_pct: f64,

    // ── Excursion ──
    /// Maximum favorable excursion relative to entry.
    pub mfe_pct: f64,
    /// Maximum adverse excursion relative to entry (<= 0).
    pub mae_pct: f64,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.net_pnl_pct > 0.0
    }

    pub fn is_open(&self) -> bool {
        self.exit_reason == ExitReason::StillOpen
    }

    /// Sum of all exit leg sizes. Equals 1.0 for every finished trade.
    pub fn exited_size(&self) -> f64 {
        self.exits.iter().map(|e| e.size).sum()
    }
}
