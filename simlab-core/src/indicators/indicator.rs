//! Indicator trait.
//!
//! Indicators are pure functions: candle history in, numeric series out.
//! They are computed once per run before the simulation loop and queried
//! by candle index afterwards.

use crate::domain::Candle;

/// Canonical field name. A signal condition that omits its field reads this.
pub const VALUE_FIELD: &str = "value";

/// A named, possibly multi-field series derived from candles.
///
/// `compute` returns one series per entry of `fields()`, in that order, each
/// as long as `candles`. Entries before `lookback()` are NaN.
///
/// Values are causal: the value at index `t` computed over `candles[..=t]`
/// equals the value at `t` computed over the whole slice.
pub trait Indicator: Send + Sync {
    /// Alias under which signal conditions reference this indicator.
    fn name(&self) -> &str;

    /// Index of the first candle with a valid value.
    fn lookback(&self) -> usize;

    /// Output fields. The first one is always [`VALUE_FIELD`].
    fn fields(&self) -> &'static [&'static str] {
        &[VALUE_FIELD]
    }

    fn compute(&self, candles: &[Candle]) -> Vec<Vec<f64>>;
}
