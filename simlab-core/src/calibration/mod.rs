//! Calibration: fit execution-model parameters from observed live trades.

pub mod calibrate;
pub mod record;
pub mod stats;

pub use calibrate::{
    calibrate, CalibrationError, CalibrationOptions, CalibrationReport, CalibrationStats,
    FailureBreakdown, LatencyStats, JITTER_IQR_SHARE,
};
pub use record::LiveTradeRecord;
pub use stats::percentile_sorted;
