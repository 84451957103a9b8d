//! Exit/position state machine: the simulation core.

pub mod config;
pub mod machine;
pub mod tie_break;

pub use config::{CompiledExit, ExitConfig, ProfitTarget, TimeExitConfig, TrailingStopConfig};
pub use machine::{ExitStateMachine, StepOutcome};
pub use tie_break::TieBreakPolicy;
