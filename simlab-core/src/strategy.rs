//! Strategy configuration: indicators, entry, exit and fees.
//!
//! A strategy is validated and compiled once, before any candle is touched.
//! Compilation builds the indicator engine, resolves every signal reference
//! and normalises group defaults; a strategy that fails any step is rejected
//! whole.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::StrategyHash;
use crate::entry::{CompiledEntry, EntryConfig};
use crate::error::ConfigError;
use crate::exit::{CompiledExit, ExitConfig};
use crate::fees::FeeConfig;
use crate::indicators::{IndicatorEngine, IndicatorSpec};
use crate::signals::IndicatorCatalog;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(default)]
    pub indicators: Vec<IndicatorSpec>,
    #[serde(default)]
    pub entry: EntryConfig,
    #[serde(default)]
    pub exit: ExitConfig,
    #[serde(default)]
    pub fees: FeeConfig,
}

impl StrategyConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indicators: Vec::new(),
            entry: EntryConfig::default(),
            exit: ExitConfig::default(),
            fees: FeeConfig::default(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Declared indicator aliases with their fields.
    pub fn catalog(&self) -> Result<IndicatorCatalog, ConfigError> {
        let mut seen = BTreeSet::new();
        let mut catalog = IndicatorCatalog::new();
        for spec in &self.indicators {
            spec.validate()?;
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::DuplicateIndicator(spec.name.clone()));
            }
            catalog.insert(spec.name.clone(), spec.kind.fields());
        }
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compile().map(|_| ())
    }

    pub fn compile(&self) -> Result<CompiledStrategy, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::param("strategy", "name must not be empty"));
        }
        self.fees.validate()?;
        let catalog = self.catalog()?;
        let entry = self.entry.compile(&catalog)?;
        let exit = self.exit.compile(&catalog)?;
        let indicators = self
            .indicators
            .iter()
            .map(IndicatorSpec::build)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledStrategy {
            name: self.name.clone(),
            fingerprint: self.fingerprint(),
            engine: IndicatorEngine::new(indicators),
            entry,
            exit,
            fees: self.fees,
        })
    }

    /// BLAKE3 of the canonical JSON form. Identical configs hash identically
    /// regardless of the file format they were loaded from.
    pub fn fingerprint(&self) -> StrategyHash {
        let json = serde_json::to_vec(self).expect("StrategyConfig must serialize");
        StrategyHash::from_bytes(&json)
    }
}

/// A validated strategy, immutable for the lifetime of its runs.
#[derive(Debug)]
pub struct CompiledStrategy {
    pub name: String,
    pub fingerprint: StrategyHash,
    pub engine: IndicatorEngine,
    pub entry: CompiledEntry,
    pub exit: CompiledExit,
    pub fees: FeeConfig,
}
