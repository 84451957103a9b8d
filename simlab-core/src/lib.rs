//! SimLab Core: deterministic candle-by-candle strategy simulation.
//!
//! This crate contains the simulation core:
//! - Domain types (candles, positions, events, trade records)
//! - Indicator engine with per-indicator warmup
//! - Nested AND/OR signal trees, compiled once per strategy
//! - Entry policy (immediate, initial drop, trailing rebound, signal)
//! - Exit/position state machine with laddered targets and a ratcheting stop
//! - Execution cost model and its calibration from live-trade records
//!
//! Everything here is synchronous and free of I/O. Orchestration lives in
//! `simlab-runner`.

pub mod calibration;
pub mod domain;
pub mod entry;
pub mod error;
pub mod execution;
pub mod exit;
pub mod fees;
pub mod indicators;
pub mod rng;
pub mod signals;
pub mod simulator;
pub mod strategy;

pub use error::ConfigError;
pub use simulator::{simulate, RunOutcome, RunStatus, Simulator};
pub use strategy::{CompiledStrategy, StrategyConfig};
