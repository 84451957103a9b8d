//! Entry configuration and its compiled form.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::signals::{compile_group, IndicatorCatalog, SignalGroupConfig, SignalNode};

/// How long the entry policy keeps waiting for a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxWait {
    /// Candles after the start candle (the start candle itself is offset 0).
    Candles(usize),
    /// Wall-clock minutes after the start candle's timestamp, inclusive.
    Minutes(u64),
}

impl Default for MaxWait {
    fn default() -> Self {
        MaxWait::Candles(60)
    }
}

/// Fill when price drops to `start_open * (1 + drop_pct)`. `drop_pct` is
/// negative: -0.05 waits for a 5% dip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialEntry {
    pub drop_pct: f64,
}

/// Fill when price rebounds `rebound_pct` above the lowest low seen so far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingEntry {
    pub rebound_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_entry: Option<InitialEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_entry: Option<TrailingEntry>,
    #[serde(default)]
    pub max_wait: MaxWait,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<SignalGroupConfig>,
}

impl EntryConfig {
    /// Enter at the first candle's open.
    pub fn immediate() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(initial) = self.initial_entry {
            let d = initial.drop_pct;
            if !d.is_finite() || d <= -1.0 || d > 0.0 {
                return Err(ConfigError::param(
                    "initial_entry",
                    format!("drop_pct must be in (-1, 0], got {d}"),
                ));
            }
        }
        if let Some(trailing) = self.trailing_entry {
            let r = trailing.rebound_pct;
            if !r.is_finite() || r <= 0.0 {
                return Err(ConfigError::param(
                    "trailing_entry",
                    format!("rebound_pct must be positive, got {r}"),
                ));
            }
        }
        Ok(())
    }

    /// Validate and resolve the entry signal against declared indicators.
    pub fn compile(&self, catalog: &IndicatorCatalog) -> Result<CompiledEntry, ConfigError> {
        self.validate()?;
        let signal = self
            .signal
            .as_ref()
            .map(|group| compile_group(group, catalog))
            .transpose()?;
        Ok(CompiledEntry {
            initial_drop: self.initial_entry.map(|i| i.drop_pct),
            trailing_rebound: self.trailing_entry.map(|t| t.rebound_pct),
            max_wait: self.max_wait,
            signal,
        })
    }
}

/// Entry rules ready for scanning.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledEntry {
    pub initial_drop: Option<f64>,
    pub trailing_rebound: Option<f64>,
    pub max_wait: MaxWait,
    pub signal: Option<SignalNode>,
}

impl CompiledEntry {
    pub fn has_price_trigger(&self) -> bool {
        self.initial_drop.is_some() || self.trailing_rebound.is_some()
    }

    /// No price trigger and no signal: fill at the first candle's open.
    pub fn is_immediate(&self) -> bool {
        !self.has_price_trigger() && self.signal.is_none()
    }
}
