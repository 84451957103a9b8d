//! Serializable run configuration.
//!
//! ```toml
//! master_seed = 42
//! threads = 0            # 0 = one worker per core
//! tie_break = "conservative"
//!
//! [friction]
//! enabled = true
//! model_path = "models/jupiter/20240301T120000Z_412.json"
//! size = 2.5
//! congested = false
//!
//! [log]
//! level = "info"
//! format = "compact"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use simlab_core::execution::{ExecutionContext, DEFAULT_EXIT_RETRIES};
use simlab_core::exit::TieBreakPolicy;

use crate::logging::LogConfig;

#[derive(Debug, Error)]
pub enum RunConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse run config: {0}")]
    Parse(String),
    #[error("invalid run config: {0}")]
    Invalid(String),
}

/// How the execution-cost overlay is applied to each simulated trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrictionConfig {
    pub enabled: bool,
    /// Calibrated model file. Required when `enabled`.
    pub model_path: Option<PathBuf>,
    /// Trade notional, in the unit the model was calibrated in.
    pub size: f64,
    pub congested: bool,
    pub fee_shortfall: bool,
    pub exit_retries: u32,
}

impl Default for FrictionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model_path: None,
            size: 1.0,
            congested: false,
            fee_shortfall: false,
            exit_retries: DEFAULT_EXIT_RETRIES,
        }
    }
}

impl FrictionConfig {
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::new(self.size)
            .congested(self.congested)
            .fee_shortfall(self.fee_shortfall)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Root of every per-scenario seed.
    pub master_seed: u64,
    /// Worker threads for sweeps; 0 uses every core.
    pub threads: usize,
    /// Overrides each strategy's own tie-break policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tie_break: Option<TieBreakPolicy>,
    pub friction: FrictionConfig,
    pub log: LogConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            master_seed: 42,
            threads: 0,
            tie_break: None,
            friction: FrictionConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, RunConfigError> {
        let config: RunConfig = toml::from_str(text).map_err(|e| RunConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, RunConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| RunConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), RunConfigError> {
        let f = &self.friction;
        if f.enabled && f.model_path.is_none() {
            return Err(RunConfigError::Invalid(
                "friction.enabled requires friction.model_path".into(),
            ));
        }
        if !f.size.is_finite() || f.size < 0.0 {
            return Err(RunConfigError::Invalid(format!(
                "friction.size must be finite and non-negative, got {}",
                f.size
            )));
        }
        Ok(())
    }

    /// Content hash of the configuration, for labelling output directories.
    pub fn run_id(&self) -> String {
        let json = serde_json::to_string(self).expect("RunConfig must serialize");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = RunConfig::from_toml_str("").unwrap();
        assert_eq!(config, RunConfig::default());
        assert!(!config.friction.enabled);
        assert_eq!(config.friction.exit_retries, DEFAULT_EXIT_RETRIES);
    }

    #[test]
    fn full_toml_round_trip() {
        let text = r#"
            master_seed = 7
            threads = 4
            tie_break = "ohlc_path"

            [friction]
            enabled = true
            model_path = "models/v.json"
            size = 2.5
            congested = true

            [log]
            level = "debug"
            format = "json"
        "#;
        let config = RunConfig::from_toml_str(text).unwrap();
        assert_eq!(config.master_seed, 7);
        assert_eq!(config.threads, 4);
        assert_eq!(config.tie_break, Some(TieBreakPolicy::OhlcPath));
        assert_eq!(config.friction.size, 2.5);
        assert!(config.friction.context().congested);
        assert_eq!(config.log.format, LogFormat::Json);

        let back = toml::to_string(&config).unwrap();
        assert_eq!(RunConfig::from_toml_str(&back).unwrap(), config);
    }

    #[test]
    fn friction_without_model_rejected() {
        let err = RunConfig::from_toml_str("[friction]\nenabled = true").unwrap_err();
        assert!(matches!(err, RunConfigError::Invalid(_)), "{err}");
    }

    #[test]
    fn unknown_tie_break_is_a_parse_error() {
        let err = RunConfig::from_toml_str(r#"tie_break = "coin_flip""#).unwrap_err();
        assert!(matches!(err, RunConfigError::Parse(_)));
    }

    #[test]
    fn run_id_tracks_content() {
        let a = RunConfig::default();
        let mut b = a.clone();
        assert_eq!(a.run_id(), b.run_id());
        b.master_seed += 1;
        assert_ne!(a.run_id(), b.run_id());
    }
}
