//! Sweeps: every (token, strategy, iteration) combination, in parallel.
//!
//! Scenarios are expanded in a fixed order and results come back in that
//! same order regardless of worker count. Per-scenario seeds come from the
//! RNG hierarchy, so the thread count never changes the numbers.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

use simlab_core::CompiledStrategy;

use crate::data::MarketData;
use crate::metrics::PerformanceMetrics;
use crate::presets::{PresetError, PresetRegistry};
use crate::runner::{Runner, Scenario, ScenarioError, ScenarioResult};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Preset(#[from] PresetError),
    #[error("sweep grid is empty")]
    EmptyGrid,
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Cartesian grid of scenario parameters.
#[derive(Debug, Clone, Default)]
pub struct SweepGrid {
    pub tokens: Vec<String>,
    /// Preset names, resolved against the registry before anything runs.
    pub strategies: Vec<String>,
    /// Iterations per (token, strategy); each draws an independent friction stream.
    pub iterations: u64,
}

impl SweepGrid {
    pub fn new<T, S>(tokens: impl IntoIterator<Item = T>, strategies: impl IntoIterator<Item = S>) -> Self
    where
        T: Into<String>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            strategies: strategies.into_iter().map(Into::into).collect(),
            iterations: 1,
        }
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    /// Every token the market data holds.
    pub fn all_tokens(data: &MarketData, strategies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(data.tokens(), strategies)
    }

    pub fn size(&self) -> usize {
        self.tokens.len() * self.strategies.len() * self.iterations as usize
    }

    /// Expand into scenarios: token-major, then strategy, then iteration.
    /// Fails on the first unknown strategy name.
    pub fn scenarios(&self, registry: &PresetRegistry) -> Result<Vec<Scenario>, PresetError> {
        let strategies: Vec<Arc<CompiledStrategy>> = self
            .strategies
            .iter()
            .map(|name| registry.get(name))
            .collect::<Result<_, _>>()?;

        let mut scenarios = Vec::with_capacity(self.size());
        for token in &self.tokens {
            for strategy in &strategies {
                for iteration in 0..self.iterations {
                    scenarios.push(Scenario::new(token.clone(), Arc::clone(strategy), iteration));
                }
            }
        }
        Ok(scenarios)
    }
}

/// Sweep executor over a shared runner and registry.
pub struct Sweep<'a> {
    runner: &'a Runner,
    registry: &'a PresetRegistry,
    threads: usize,
}

impl<'a> Sweep<'a> {
    pub fn new(runner: &'a Runner, registry: &'a PresetRegistry) -> Self {
        Self {
            runner,
            registry,
            threads: 0,
        }
    }

    /// Worker count; 0 uses one per core, 1 runs on the calling thread.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn run(&self, grid: &SweepGrid, data: &MarketData) -> Result<SweepResults, SweepError> {
        let scenarios = grid.scenarios(self.registry)?;
        if scenarios.is_empty() {
            return Err(SweepError::EmptyGrid);
        }
        info!(
            scenarios = scenarios.len(),
            tokens = grid.tokens.len(),
            strategies = grid.strategies.len(),
            threads = self.threads,
            seed = self.runner.master_seed(),
            "starting sweep"
        );

        let run_one = |scenario: &Scenario| match data.get(&scenario.token) {
            Some(candles) => self.runner.run(scenario, candles),
            None => ScenarioResult {
                token: scenario.token.clone(),
                strategy: scenario.strategy.name.clone(),
                fingerprint: scenario.strategy.fingerprint.clone(),
                iteration: scenario.iteration,
                seed: self.runner.seed_for(scenario),
                outcome: Err(ScenarioError::MissingCandles {
                    token: scenario.token.clone(),
                }),
            },
        };

        let results: Vec<ScenarioResult> = if self.threads == 1 {
            scenarios.iter().map(run_one).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .build()
                .map_err(|e| SweepError::ThreadPool(e.to_string()))?;
            pool.install(|| scenarios.par_iter().map(run_one).collect())
        };

        let results = SweepResults::new(results);
        info!(
            scenarios = results.len(),
            failures = results.failures().count(),
            trades = results.trades().count(),
            "sweep finished"
        );
        Ok(results)
    }
}

/// Results from a sweep, in scenario order.
#[derive(Debug, Clone)]
pub struct SweepResults {
    results: Vec<ScenarioResult>,
}

impl SweepResults {
    fn new(results: Vec<ScenarioResult>) -> Self {
        Self { results }
    }

    pub fn all(&self) -> &[ScenarioResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, token: &str, strategy: &str, iteration: u64) -> Option<&ScenarioResult> {
        self.results
            .iter()
            .find(|r| r.token == token && r.strategy == strategy && r.iteration == iteration)
    }

    /// Scenarios that ended in an error rather than a run outcome.
    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| r.outcome.is_err())
    }

    /// Scenarios that produced a trade.
    pub fn trades(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| r.trade().is_some())
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        PerformanceMetrics::compute(&self.results)
    }

    /// Metrics per strategy name.
    pub fn by_strategy(&self) -> BTreeMap<String, PerformanceMetrics> {
        let mut groups: BTreeMap<String, Vec<ScenarioResult>> = BTreeMap::new();
        for r in &self.results {
            groups.entry(r.strategy.clone()).or_default().push(r.clone());
        }
        groups
            .into_iter()
            .map(|(name, rs)| (name, PerformanceMetrics::compute(&rs)))
            .collect()
    }

    /// Strategies sorted by average net PnL, best first.
    pub fn ranked(&self) -> Vec<(String, PerformanceMetrics)> {
        let mut ranked: Vec<_> = self.by_strategy().into_iter().collect();
        ranked.sort_by(|a, b| b.1.avg_net_pnl_pct.total_cmp(&a.1.avg_net_pnl_pct));
        ranked
    }

    pub fn into_vec(self) -> Vec<ScenarioResult> {
        self.results
    }
}
