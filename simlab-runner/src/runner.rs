//! Scenario runner: one strategy over one token's candles, plus the
//! execution-cost overlay when friction is enabled.
//!
//! The runner is the orchestration boundary. Invariant violations inside the
//! core panic; here they are caught and attached to the scenario's result so
//! that sibling scenarios in a sweep keep running.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use simlab_core::domain::{is_sorted, Candle, RunId, StrategyHash, TradeRecord};
use simlab_core::execution::{ExecutionContext, ExecutionModel, OverlayOutcome, TradeExecutor};
use simlab_core::exit::TieBreakPolicy;
use simlab_core::rng::RngHierarchy;
use simlab_core::{CompiledStrategy, RunOutcome, Simulator};

use crate::config::{RunConfig, RunConfigError};

/// Why a scenario produced no report. Data-sufficiency outcomes are not
/// errors; they live in [`RunOutcome::status`].
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ScenarioError {
    #[error("simulation invariant violated: {message}")]
    InvariantViolation { message: String },
    #[error("candles for '{token}' are not sorted by timestamp")]
    UnsortedCandles { token: String },
    #[error("no candles loaded for '{token}'")]
    MissingCandles { token: String },
}

/// One unit of work: a compiled strategy, a token, and an iteration number
/// that selects an independent friction stream.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub token: String,
    pub strategy: Arc<CompiledStrategy>,
    pub iteration: u64,
}

impl Scenario {
    pub fn new(token: impl Into<String>, strategy: Arc<CompiledStrategy>, iteration: u64) -> Self {
        Self {
            token: token.into(),
            strategy,
            iteration,
        }
    }

    /// Run id shared by every iteration of this strategy.
    pub fn run_id(&self) -> RunId {
        RunId::from_bytes(self.strategy.fingerprint.0.as_bytes())
    }
}

/// Everything one scenario produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub run: RunOutcome,
    /// Present when friction is enabled and the run produced a trade.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed: Option<OverlayOutcome>,
}

#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub token: String,
    pub strategy: String,
    pub fingerprint: StrategyHash,
    pub iteration: u64,
    /// Sub-seed the friction draws were taken from.
    pub seed: u64,
    pub outcome: Result<ScenarioReport, ScenarioError>,
}

impl ScenarioResult {
    pub fn report(&self) -> Option<&ScenarioReport> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ScenarioError> {
        self.outcome.as_ref().err()
    }

    pub fn trade(&self) -> Option<&TradeRecord> {
        self.report().and_then(|r| r.run.trade.as_ref())
    }

    pub fn executed(&self) -> Option<&OverlayOutcome> {
        self.report().and_then(|r| r.executed.as_ref())
    }
}

#[derive(Debug, Clone)]
struct Friction {
    model: ExecutionModel,
    context: ExecutionContext,
    exit_retries: u32,
}

/// Runs scenarios. Holds no mutable state, so one instance is shared by
/// every sweep worker.
#[derive(Debug, Clone)]
pub struct Runner {
    hierarchy: RngHierarchy,
    tie_break: Option<TieBreakPolicy>,
    friction: Option<Friction>,
}

impl Runner {
    pub fn new(master_seed: u64) -> Self {
        Self {
            hierarchy: RngHierarchy::new(master_seed),
            tie_break: None,
            friction: None,
        }
    }

    /// Override every strategy's own tie-break policy.
    pub fn with_tie_break(mut self, tie_break: Option<TieBreakPolicy>) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Apply the execution-cost overlay to every simulated trade.
    pub fn with_friction(mut self, model: ExecutionModel, context: ExecutionContext, exit_retries: u32) -> Self {
        if !model.is_calibrated() {
            warn!(venue = %model.venue, "friction model carries no calibration metadata");
        }
        self.friction = Some(Friction {
            model,
            context,
            exit_retries,
        });
        self
    }

    /// Build from a run config. `model` is the already-loaded friction model;
    /// it is required when friction is enabled and ignored otherwise.
    pub fn from_config(config: &RunConfig, model: Option<ExecutionModel>) -> Result<Self, RunConfigError> {
        let runner = Self::new(config.master_seed).with_tie_break(config.tie_break);
        if !config.friction.enabled {
            return Ok(runner);
        }
        let model = model.ok_or_else(|| {
            RunConfigError::Invalid("friction is enabled but no execution model was supplied".into())
        })?;
        Ok(runner.with_friction(model, config.friction.context(), config.friction.exit_retries))
    }

    pub fn master_seed(&self) -> u64 {
        self.hierarchy.master_seed()
    }

    pub fn friction_enabled(&self) -> bool {
        self.friction.is_some()
    }

    pub fn seed_for(&self, scenario: &Scenario) -> u64 {
        self.hierarchy
            .sub_seed(&scenario.run_id(), &scenario.token, scenario.iteration)
    }

    /// Run one scenario. Never panics on behalf of the core.
    pub fn run(&self, scenario: &Scenario, candles: &[Candle]) -> ScenarioResult {
        let seed = self.seed_for(scenario);
        let outcome = self.run_inner(scenario, candles);
        match &outcome {
            Ok(report) => debug!(
                token = %scenario.token,
                strategy = %scenario.strategy.name,
                iteration = scenario.iteration,
                seed,
                status = report.run.status.as_str(),
                "scenario finished"
            ),
            Err(e) => warn!(
                token = %scenario.token,
                strategy = %scenario.strategy.name,
                iteration = scenario.iteration,
                seed,
                error = %e,
                "scenario failed"
            ),
        }
        ScenarioResult {
            token: scenario.token.clone(),
            strategy: scenario.strategy.name.clone(),
            fingerprint: scenario.strategy.fingerprint.clone(),
            iteration: scenario.iteration,
            seed,
            outcome,
        }
    }

    fn run_inner(&self, scenario: &Scenario, candles: &[Candle]) -> Result<ScenarioReport, ScenarioError> {
        if !is_sorted(candles) {
            return Err(ScenarioError::UnsortedCandles {
                token: scenario.token.clone(),
            });
        }

        isolate(|| {
            let run = Simulator::new(&scenario.strategy)
                .with_tie_break(self.tie_break)
                .run(candles);
            let executed = match (&self.friction, &run.trade) {
                (Some(friction), Some(trade)) => {
                    let mut rng = self
                        .hierarchy
                        .rng_for(&scenario.run_id(), &scenario.token, scenario.iteration);
                    let outcome = TradeExecutor::new(&friction.model, friction.context)
                        .with_exit_retries(friction.exit_retries)
                        .execute(trade, candles, &mut rng);
                    Some(outcome)
                }
                _ => None,
            };
            ScenarioReport { run, executed }
        })
    }
}

/// Run `f`, turning a panic into [`ScenarioError::InvariantViolation`].
pub(crate) fn isolate<T>(f: impl FnOnce() -> T) -> Result<T, ScenarioError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| ScenarioError::InvariantViolation {
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
