//! Execution cost model: latency, slippage, failures and partial fills.
//!
//! Pure functions of (ideal fill, model, context, rng). Every random draw
//! comes from a generator owned by the caller, seeded per run through
//! [`crate::rng::RngHierarchy`].

pub mod friction;
pub mod model;
pub mod overlay;

pub use friction::{
    apply_friction, ActualFill, ExecutionContext, FailedFill, FillOutcome, IdealFill, Side,
};
pub use model::{
    CalibrationMeta, ExecutionModel, FailureModel, LatencyDistribution, PartialFillModel,
    SlippageModel, MODEL_SCHEMA_VERSION,
};
pub use overlay::{
    ExecutedExit, ExecutedTrade, LegAttempt, LegKind, OverlayOutcome, TradeExecutor,
    DEFAULT_EXIT_RETRIES,
};
