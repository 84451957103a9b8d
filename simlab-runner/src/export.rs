//! Export of sweep results: trade tape as CSV, event logs and executed
//! trades as JSONL, aggregate metrics as JSON.
//!
//! JSONL lines carry the scenario key (token, strategy, iteration) so a
//! file can be streamed and filtered without the rest of the sweep.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use simlab_core::domain::SimulationEvent;
use simlab_core::execution::OverlayOutcome;

use crate::metrics::PerformanceMetrics;
use crate::runner::{ScenarioError, ScenarioResult};
use crate::sweep::SweepResults;

/// One simulation event tagged with its scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub token: String,
    pub strategy: String,
    pub iteration: u64,
    pub event: SimulationEvent,
}

/// Overlay result for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedRecord {
    pub token: String,
    pub strategy: String,
    pub iteration: u64,
    pub seed: u64,
    pub execution: OverlayOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub token: String,
    pub strategy: String,
    pub iteration: u64,
    pub error: ScenarioError,
}

#[derive(Debug, Clone, Serialize)]
struct MetricsReport<'a> {
    overall: &'a PerformanceMetrics,
    by_strategy: &'a BTreeMap<String, PerformanceMetrics>,
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trade tape, one row per scenario that produced a trade.
///
/// PnL and excursion columns are fractions (0.10 = 10%).
pub fn export_trades_csv(results: &[ScenarioResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "token",
        "strategy",
        "iteration",
        "trade_id",
        "entry_index",
        "entry_time_ms",
        "entry_price",
        "entry_trigger",
        "exit_index",
        "exit_time_ms",
        "exit_price",
        "exit_reason",
        "exit_legs",
        "candles_held",
        "gross_pnl_pct",
        "fees",
        "slippage",
        "net_pnl_pct",
        "mfe_pct",
        "mae_pct",
    ])?;

    for r in results {
        let Some(t) = r.trade() else { continue };
        wtr.write_record([
            r.token.as_str(),
            r.strategy.as_str(),
            &r.iteration.to_string(),
            &t.trade_id.0.to_string(),
            &t.entry_index.to_string(),
            &t.entry_timestamp.as_millis().to_string(),
            &format!("{:.8}", t.entry_price),
            &format!("{:?}", t.entry_trigger),
            &t.exit_index.to_string(),
            &t.exit_timestamp.as_millis().to_string(),
            &format!("{:.8}", t.exit_price),
            t.exit_reason.as_str(),
            &t.exits.len().to_string(),
            &t.candles_held.to_string(),
            &format!("{:.6}", t.gross_pnl_pct),
            &format!("{:.6}", t.costs.fees),
            &format!("{:.6}", t.costs.slippage),
            &format!("{:.6}", t.net_pnl_pct),
            &format!("{:.6}", t.mfe_pct),
            &format!("{:.6}", t.mae_pct),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── JSONL export ───────────────────────────────────────────────────

fn to_jsonl<T: Serialize>(records: impl IntoIterator<Item = T>) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(&record).context("failed to serialize JSONL record")?);
        out.push('\n');
    }
    Ok(out)
}

fn from_jsonl<T: for<'de> Deserialize<'de>>(text: &str) -> Result<Vec<T>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("malformed JSONL record on line {}", i + 1))
        })
        .collect()
}

/// Every event of every scenario, in scenario order then log order.
pub fn export_events_jsonl(results: &[ScenarioResult]) -> Result<String> {
    to_jsonl(results.iter().flat_map(|r| {
        r.report().into_iter().flat_map(move |report| {
            report.run.events.iter().map(move |event| EventRecord {
                token: r.token.clone(),
                strategy: r.strategy.clone(),
                iteration: r.iteration,
                event: event.clone(),
            })
        })
    }))
}

pub fn import_events_jsonl(text: &str) -> Result<Vec<EventRecord>> {
    from_jsonl(text)
}

pub fn export_executed_jsonl(results: &[ScenarioResult]) -> Result<String> {
    to_jsonl(results.iter().filter_map(|r| {
        r.executed().map(|execution| ExecutedRecord {
            token: r.token.clone(),
            strategy: r.strategy.clone(),
            iteration: r.iteration,
            seed: r.seed,
            execution: execution.clone(),
        })
    }))
}

pub fn import_executed_jsonl(text: &str) -> Result<Vec<ExecutedRecord>> {
    from_jsonl(text)
}

pub fn export_failures_jsonl(results: &[ScenarioResult]) -> Result<String> {
    to_jsonl(results.iter().filter_map(|r| {
        r.error().map(|error| FailureRecord {
            token: r.token.clone(),
            strategy: r.strategy.clone(),
            iteration: r.iteration,
            error: error.clone(),
        })
    }))
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write the full artifact set for a sweep into `dir`:
/// - `trades.csv`
/// - `events.jsonl`
/// - `executed.jsonl` (only when friction was enabled)
/// - `failures.jsonl`
/// - `metrics.json` (overall and per strategy)
pub fn write_artifacts(results: &SweepResults, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;

    let all = results.all();
    write(dir, "trades.csv", &export_trades_csv(all)?)?;
    write(dir, "events.jsonl", &export_events_jsonl(all)?)?;
    if all.iter().any(|r| r.executed().is_some()) {
        write(dir, "executed.jsonl", &export_executed_jsonl(all)?)?;
    }
    write(dir, "failures.jsonl", &export_failures_jsonl(all)?)?;

    let overall = results.metrics();
    let by_strategy = results.by_strategy();
    let report = MetricsReport {
        overall: &overall,
        by_strategy: &by_strategy,
    };
    let json = serde_json::to_string_pretty(&report).context("failed to serialize metrics")?;
    write(dir, "metrics.json", &json)?;

    tracing::info!(dir = %dir.display(), scenarios = all.len(), "wrote sweep artifacts");
    Ok(())
}

fn write(dir: &Path, name: &str, contents: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
}
