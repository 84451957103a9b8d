//! Aggregate performance metrics over a set of scenario results.
//!
//! Every metric is a pure function: a slice of per-trade net PnL fractions
//! in, scalar out. Trades are taken in result order, which a sweep keeps
//! deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use simlab_core::execution::{ExecutedTrade, OverlayOutcome};
use simlab_core::RunStatus;

use crate::runner::ScenarioResult;

/// Profit factor reported when there are no losing trades.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Summary of the execution-cost overlay across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Trades the overlay was applied to.
    pub attempted: usize,
    pub entry_failures: usize,
    /// Mean realized share of the intended size, over executed trades.
    pub avg_realized_size: f64,
    /// Mean net PnL relative to the intended notional, over executed trades.
    pub avg_net_pnl_pct: f64,
    pub avg_entry_slippage_bps: f64,
    pub avg_entry_latency_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // ── Run outcomes ──
    pub runs: usize,
    pub completed: usize,
    pub still_open: usize,
    pub entry_expired: usize,
    pub insufficient_data: usize,
    pub errors: usize,

    // ── Simulated trades ──
    pub trade_count: usize,
    pub win_rate: f64,
    pub avg_net_pnl_pct: f64,
    pub median_net_pnl_pct: f64,
    /// Compounded return of taking every trade in sequence.
    pub total_return: f64,
    pub profit_factor: f64,
    /// Worst peak-to-trough of the compounded equity curve (<= 0).
    pub max_drawdown: f64,
    pub max_consecutive_losses: usize,
    pub exit_reasons: BTreeMap<String, usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionStats>,
}

impl PerformanceMetrics {
    pub fn compute(results: &[ScenarioResult]) -> Self {
        let mut m = Self::empty();
        m.runs = results.len();

        let mut pnls = Vec::new();
        let mut overlays = Vec::new();
        for result in results {
            let report = match &result.outcome {
                Ok(report) => report,
                Err(_) => {
                    m.errors += 1;
                    continue;
                }
            };
            match report.run.status {
                RunStatus::Completed => m.completed += 1,
                RunStatus::StillOpen => m.still_open += 1,
                RunStatus::EntryExpired { .. } => m.entry_expired += 1,
                RunStatus::InsufficientData { .. } => m.insufficient_data += 1,
            }
            if let Some(trade) = &report.run.trade {
                pnls.push(trade.net_pnl_pct);
                *m.exit_reasons
                    .entry(trade.exit_reason.as_str().to_string())
                    .or_insert(0) += 1;
            }
            if let Some(overlay) = &report.executed {
                overlays.push(overlay);
            }
        }

        let curve = equity_curve(&pnls);
        m.trade_count = pnls.len();
        m.win_rate = win_rate(&pnls);
        m.avg_net_pnl_pct = mean_f64(&pnls);
        m.median_net_pnl_pct = median(&pnls);
        m.total_return = curve.last().map_or(0.0, |eq| eq - 1.0);
        m.profit_factor = profit_factor(&pnls);
        m.max_drawdown = max_drawdown(&curve);
        m.max_consecutive_losses = max_consecutive_losses(&pnls);
        if !overlays.is_empty() {
            m.execution = Some(execution_stats(&overlays));
        }
        m
    }

    fn empty() -> Self {
        Self {
            runs: 0,
            completed: 0,
            still_open: 0,
            entry_expired: 0,
            insufficient_data: 0,
            errors: 0,
            trade_count: 0,
            win_rate: 0.0,
            avg_net_pnl_pct: 0.0,
            median_net_pnl_pct: 0.0,
            total_return: 0.0,
            profit_factor: 0.0,
            max_drawdown: 0.0,
            max_consecutive_losses: 0,
            exit_reasons: BTreeMap::new(),
            execution: None,
        }
    }
}

fn execution_stats(overlays: &[&OverlayOutcome]) -> ExecutionStats {
    let executed: Vec<&ExecutedTrade> = overlays.iter().filter_map(|o| o.executed()).collect();
    let avg = |f: fn(&ExecutedTrade) -> f64| mean_f64(&executed.iter().map(|t| f(t)).collect::<Vec<_>>());
    ExecutionStats {
        attempted: overlays.len(),
        entry_failures: overlays.len() - executed.len(),
        avg_realized_size: avg(|t| t.realized_size),
        avg_net_pnl_pct: avg(|t| t.net_pnl_pct),
        avg_entry_slippage_bps: avg(|t| t.entry.slippage_bps),
        avg_entry_latency_ms: avg(|t| t.entry.latency_ms),
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Equity after each trade, starting from 1.0 and compounding.
pub fn equity_curve(pnls: &[f64]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(pnls.len() + 1);
    let mut equity = 1.0;
    curve.push(equity);
    for pnl in pnls {
        equity *= 1.0 + pnl;
        curve.push(equity);
    }
    curve
}

/// Maximum drawdown as a negative fraction of the running peak.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Share of trades with positive net PnL.
pub fn win_rate(pnls: &[f64]) -> f64 {
    if pnls.is_empty() {
        return 0.0;
    }
    pnls.iter().filter(|&&p| p > 0.0).count() as f64 / pnls.len() as f64
}

/// Gross profit over gross loss, capped at [`PROFIT_FACTOR_CAP`].
pub fn profit_factor(pnls: &[f64]) -> f64 {
    let gross_profit: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();
    if gross_loss < 1e-12 {
        return if gross_profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

pub fn max_consecutive_losses(pnls: &[f64]) -> usize {
    let mut best = 0;
    let mut run = 0;
    for &p in pnls {
        if p < 0.0 {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
