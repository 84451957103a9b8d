//! Domain types for the simulator.

pub mod candle;
pub mod event;
pub mod ids;
pub mod position;
pub mod trade;

pub use candle::{candle_index_at, is_sorted, Candle, TimeUnit, Timestamp};
pub use event::{EventKind, EventLog, EventPayload, EventReason, SimulationEvent};
pub use ids::{IdGen, RunId, StrategyHash, TradeId};
pub use position::{PendingTarget, Position, SIZE_EPSILON};
pub use trade::{CostBreakdown, ExitFill, ExitReason, TradeRecord};
