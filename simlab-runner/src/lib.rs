//! SimLab Runner: scenario orchestration on top of `simlab-core`.
//!
//! This crate provides:
//! - TOML run configuration and logging initialisation
//! - An immutable registry of named strategy presets
//! - A per-scenario runner that turns panics into per-scenario errors
//! - Parallel sweeps over tokens × strategies × seeds
//! - Aggregate performance metrics
//! - CSV / JSONL export of trades, events and executed trades
//! - A versioned store for calibrated execution models

pub mod config;
pub mod data;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod model_store;
pub mod presets;
pub mod runner;
pub mod sweep;

pub use config::{FrictionConfig, RunConfig, RunConfigError};
pub use data::{load_candles_csv, parse_candles_csv, CandleLoadError, MarketData};
pub use export::{write_artifacts, EventRecord, ExecutedRecord, FailureRecord};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{ExecutionStats, PerformanceMetrics};
pub use model_store::{ModelStore, ModelVersion, StoreError};
pub use presets::{PresetError, PresetRegistry};
pub use runner::{Runner, Scenario, ScenarioError, ScenarioReport, ScenarioResult};
pub use sweep::{Sweep, SweepError, SweepGrid, SweepResults};
