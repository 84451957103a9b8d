//! Indicator engine: precomputes every registered indicator over a candle
//! slice and hands out per-index snapshots.
//!
//! Both entry points are pure functions of the input slice and hold no
//! shared state, so independent candle series can be processed in parallel.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::Candle;

use super::indicator::Indicator;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error(
        "insufficient data for indicator '{indicator}': needs {required} candles, have {available}"
    )]
    InsufficientData {
        indicator: String,
        required: usize,
        available: usize,
    },

    #[error("candle index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Indicator values for one candle index.
///
/// `valid` is false until every registered indicator has passed its
/// lookback. Consumers must not evaluate signals on invalid snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub index: usize,
    pub valid: bool,
    values: BTreeMap<String, BTreeMap<&'static str, f64>>,
}

impl IndicatorSnapshot {
    /// Field value, or `None` if the indicator or field is unknown or the
    /// value is not finite.
    pub fn get(&self, indicator: &str, field: &str) -> Option<f64> {
        self.values
            .get(indicator)?
            .get(field)
            .copied()
            .filter(|v| v.is_finite())
    }

    pub fn indicators(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Set of indicators used by one strategy.
pub struct IndicatorEngine {
    indicators: Vec<Box<dyn Indicator>>,
}

impl std::fmt::Debug for IndicatorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorEngine")
            .field(
                "indicators",
                &self.indicators.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl IndicatorEngine {
    pub fn new(indicators: Vec<Box<dyn Indicator>>) -> Self {
        Self { indicators }
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    /// Overall lookback: the max across registered indicators.
    pub fn lookback(&self) -> usize {
        self.indicators
            .iter()
            .map(|i| i.lookback())
            .max()
            .unwrap_or(0)
    }

    /// Fields of a registered indicator, by alias.
    pub fn fields_of(&self, name: &str) -> Option<&'static [&'static str]> {
        self.indicators
            .iter()
            .find(|i| i.name() == name)
            .map(|i| i.fields())
    }

    /// One snapshot per candle. Indicators are computed once over the
    /// whole slice.
    pub fn compute_series(&self, candles: &[Candle]) -> Vec<IndicatorSnapshot> {
        let lookback = self.lookback();
        let columns: Vec<(&str, &'static [&'static str], Vec<Vec<f64>>)> = self
            .indicators
            .iter()
            .map(|ind| (ind.name(), ind.fields(), ind.compute(candles)))
            .collect();

        (0..candles.len())
            .map(|index| IndicatorSnapshot {
                index,
                valid: index >= lookback,
                values: columns
                    .iter()
                    .map(|(name, fields, series)| {
                        let per_field = fields
                            .iter()
                            .zip(series)
                            .map(|(field, values)| (*field, values[index]))
                            .collect();
                        (name.to_string(), per_field)
                    })
                    .collect(),
            })
            .collect()
    }

    /// Snapshot at `index`, computed from `candles[..=index]` only.
    pub fn compute_at(
        &self,
        candles: &[Candle],
        index: usize,
    ) -> Result<IndicatorSnapshot, IndicatorError> {
        if index >= candles.len() {
            return Err(IndicatorError::IndexOutOfRange {
                index,
                len: candles.len(),
            });
        }
        if let Some(short) = self
            .indicators
            .iter()
            .filter(|i| i.lookback() > index)
            .max_by_key(|i| i.lookback())
        {
            return Err(IndicatorError::InsufficientData {
                indicator: short.name().to_string(),
                required: short.lookback() + 1,
                available: index + 1,
            });
        }

        let history = &candles[..=index];
        let values = self
            .indicators
            .iter()
            .map(|ind| {
                let series = ind.compute(history);
                let per_field = ind
                    .fields()
                    .iter()
                    .zip(&series)
                    .map(|(field, values)| (*field, values[index]))
                    .collect();
                (ind.name().to_string(), per_field)
            })
            .collect();

        Ok(IndicatorSnapshot {
            index,
            valid: true,
            values,
        })
    }
}
