//! Indicator declarations and the factory that turns them into calculators.
//!
//! Strategies declare indicators by kind and alias:
//!
//! ```toml
//! [[indicators]]
//! name = "fast"
//! type = "ema"
//! period = 9
//! ```
//!
//! The kind set is closed; an unknown `type` is rejected when the strategy
//! is parsed, never during a run.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::atr::Atr;
use super::bollinger::Bollinger;
use super::ema::Ema;
use super::indicator::{Indicator, VALUE_FIELD};
use super::macd::Macd;
use super::price::Price;
use super::rsi::Rsi;
use super::sma::Sma;

fn default_std_dev() -> f64 {
    2.0
}

/// Indicator kind and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorKind {
    Price,
    Sma {
        period: usize,
    },
    Ema {
        period: usize,
    },
    Rsi {
        period: usize,
    },
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Atr {
        period: usize,
    },
    Bollinger {
        period: usize,
        #[serde(default = "default_std_dev")]
        std_dev: f64,
    },
}

impl IndicatorKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            IndicatorKind::Price => "price",
            IndicatorKind::Sma { .. } => "sma",
            IndicatorKind::Ema { .. } => "ema",
            IndicatorKind::Rsi { .. } => "rsi",
            IndicatorKind::Macd { .. } => "macd",
            IndicatorKind::Atr { .. } => "atr",
            IndicatorKind::Bollinger { .. } => "bollinger",
        }
    }

    /// Fields this kind exposes, known without building the calculator.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            IndicatorKind::Price => &[VALUE_FIELD, "open", "high", "low", "close", "volume"],
            IndicatorKind::Macd { .. } => &[VALUE_FIELD, "signal", "histogram"],
            IndicatorKind::Bollinger { .. } => &[VALUE_FIELD, "upper", "lower", "width"],
            _ => &[VALUE_FIELD],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let component = self.type_name();
        match *self {
            IndicatorKind::Price => Ok(()),
            IndicatorKind::Sma { period }
            | IndicatorKind::Ema { period }
            | IndicatorKind::Rsi { period }
            | IndicatorKind::Atr { period } => positive(component, "period", period),
            IndicatorKind::Macd { fast, slow, signal } => {
                positive(component, "fast", fast)?;
                positive(component, "slow", slow)?;
                positive(component, "signal", signal)?;
                if fast >= slow {
                    return Err(ConfigError::param(
                        component,
                        format!("fast period ({fast}) must be below slow period ({slow})"),
                    ));
                }
                Ok(())
            }
            IndicatorKind::Bollinger { period, std_dev } => {
                positive(component, "period", period)?;
                if !std_dev.is_finite() || std_dev <= 0.0 {
                    return Err(ConfigError::param(
                        component,
                        format!("std_dev must be a positive number, got {std_dev}"),
                    ));
                }
                Ok(())
            }
        }
    }
}

fn positive(component: &'static str, param: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::param(component, format!("{param} must be >= 1")));
    }
    Ok(())
}

/// A named indicator declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: IndicatorKind,
}

impl IndicatorSpec {
    pub fn new(name: impl Into<String>, kind: IndicatorKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::param(
                self.kind.type_name(),
                "indicator name must not be empty",
            ));
        }
        self.kind.validate()
    }

    /// Validate and build the calculator under this spec's alias.
    pub fn build(&self) -> Result<Box<dyn Indicator>, ConfigError> {
        self.validate()?;
        let name = self.name.clone();
        let indicator: Box<dyn Indicator> = match self.kind {
            IndicatorKind::Price => Box::new(Price::new().named(name)),
            IndicatorKind::Sma { period } => Box::new(Sma::new(period).named(name)),
            IndicatorKind::Ema { period } => Box::new(Ema::new(period).named(name)),
            IndicatorKind::Rsi { period } => Box::new(Rsi::new(period).named(name)),
            IndicatorKind::Macd { fast, slow, signal } => {
                Box::new(Macd::new(fast, slow, signal).named(name))
            }
            IndicatorKind::Atr { period } => Box::new(Atr::new(period).named(name)),
            IndicatorKind::Bollinger { period, std_dev } => {
                Box::new(Bollinger::new(period, std_dev).named(name))
            }
        };
        Ok(indicator)
    }
}
