//! Named strategy presets.
//!
//! The registry is built once, validated as a whole, and then only read.
//! Callers hold it by reference; there is no process-wide instance.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use simlab_core::entry::{InitialEntry, MaxWait, TrailingEntry};
use simlab_core::exit::{ProfitTarget, TimeExitConfig, TrailingStopConfig};
use simlab_core::fees::FeeConfig;
use simlab_core::indicators::{IndicatorKind, IndicatorSpec};
use simlab_core::signals::{Comparison, SignalCondition, SignalGroupConfig};
use simlab_core::{CompiledStrategy, ConfigError, StrategyConfig};

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("duplicate preset name '{0}'")]
    Duplicate(String),
    #[error("preset '{name}' is invalid: {source}")]
    Invalid {
        name: String,
        #[source]
        source: ConfigError,
    },
    #[error("unknown preset '{name}' (available: {available})")]
    Unknown { name: String, available: String },
    #[error("failed to read presets from {path}: {message}")]
    Load { path: String, message: String },
}

struct Preset {
    config: StrategyConfig,
    compiled: Arc<CompiledStrategy>,
}

/// Immutable map from preset name to a compiled strategy.
pub struct PresetRegistry {
    presets: BTreeMap<String, Preset>,
}

impl PresetRegistry {
    /// Compile every config; any invalid or duplicate entry rejects the lot.
    pub fn from_configs(configs: impl IntoIterator<Item = StrategyConfig>) -> Result<Self, PresetError> {
        let mut presets = BTreeMap::new();
        for config in configs {
            let name = config.name.clone();
            if presets.contains_key(&name) {
                return Err(PresetError::Duplicate(name));
            }
            let compiled = config.compile().map_err(|source| PresetError::Invalid {
                name: name.clone(),
                source,
            })?;
            presets.insert(
                name,
                Preset {
                    config,
                    compiled: Arc::new(compiled),
                },
            );
        }
        Ok(Self { presets })
    }

    /// Every `*.toml` file in `dir`, one strategy per file.
    pub fn from_dir(dir: &Path) -> Result<Self, PresetError> {
        let load_err = |message: String| PresetError::Load {
            path: dir.display().to_string(),
            message,
        };
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| load_err(e.to_string()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("toml"))
            .collect();
        paths.sort();

        let mut configs = Vec::with_capacity(paths.len());
        for path in paths {
            let text = std::fs::read_to_string(&path).map_err(|e| load_err(e.to_string()))?;
            let config = StrategyConfig::from_toml_str(&text).map_err(|source| PresetError::Invalid {
                name: path.display().to_string(),
                source,
            })?;
            configs.push(config);
        }
        Self::from_configs(configs)
    }

    /// The presets shipped with the runner.
    pub fn builtin() -> Self {
        Self::from_configs(builtin_configs()).expect("built-in presets must compile")
    }

    pub fn get(&self, name: &str) -> Result<Arc<CompiledStrategy>, PresetError> {
        self.presets
            .get(name)
            .map(|p| Arc::clone(&p.compiled))
            .ok_or_else(|| PresetError::Unknown {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn config(&self, name: &str) -> Option<&StrategyConfig> {
        self.presets.get(name).map(|p| &p.config)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

fn builtin_configs() -> Vec<StrategyConfig> {
    let standard_fees = FeeConfig::new(25.0, 10.0);

    // Buy at the open, scale out on a three-rung ladder, protect with a stop.
    let mut ladder = StrategyConfig::new("immediate_ladder");
    ladder.exit.targets = vec![
        ProfitTarget::new(0.4, 0.10),
        ProfitTarget::new(0.3, 0.25),
        ProfitTarget::new(0.3, 0.50),
    ];
    ladder.exit.stop_loss_pct = Some(0.15);
    ladder.exit.break_even_after_first_target = true;
    ladder.fees = standard_fees;

    let mut dip = StrategyConfig::new("dip_buyer");
    dip.entry.initial_entry = Some(InitialEntry { drop_pct: -0.10 });
    dip.entry.max_wait = MaxWait::Minutes(240);
    dip.exit.targets = vec![ProfitTarget::new(0.5, 0.15), ProfitTarget::new(0.5, 0.30)];
    dip.exit.stop_loss_pct = Some(0.20);
    dip.exit.time_exit = Some(TimeExitConfig { max_candles: 720 });
    dip.fees = standard_fees;

    let mut rebound = StrategyConfig::new("trailing_rebound");
    rebound.entry.trailing_entry = Some(TrailingEntry { rebound_pct: 0.05 });
    rebound.entry.max_wait = MaxWait::Candles(120);
    rebound.exit.stop_loss_pct = Some(0.12);
    rebound.exit.trailing_stop = Some(TrailingStopConfig {
        trail_pct: 0.10,
        activation_pct: 0.08,
    });
    rebound.exit.time_exit = Some(TimeExitConfig { max_candles: 480 });
    rebound.fees = standard_fees;

    let mut cross = StrategyConfig::new("ema_cross");
    cross.indicators = vec![
        IndicatorSpec::new("fast", IndicatorKind::Ema { period: 9 }),
        IndicatorSpec::new("slow", IndicatorKind::Ema { period: 21 }),
        IndicatorSpec::new("rsi", IndicatorKind::Rsi { period: 14 }),
    ];
    cross.entry.signal = Some(SignalGroupConfig::all(vec![
        SignalCondition::against("fast", Comparison::CrossesAbove, "slow", None),
        SignalCondition::new("rsi", Comparison::Lt, 75.0),
    ]));
    cross.entry.max_wait = MaxWait::Candles(240);
    cross.exit.targets = vec![ProfitTarget::new(0.5, 0.08)];
    cross.exit.stop_loss_pct = Some(0.06);
    cross.exit.trailing_stop = Some(TrailingStopConfig {
        trail_pct: 0.05,
        activation_pct: 0.04,
    });
    cross.exit.exit_signal = Some(SignalGroupConfig::all(vec![SignalCondition::against(
        "fast",
        Comparison::CrossesBelow,
        "slow",
        None,
    )]));
    cross.fees = standard_fees;

    let mut oversold = StrategyConfig::new("rsi_oversold");
    oversold.indicators = vec![
        IndicatorSpec::new("rsi", IndicatorKind::Rsi { period: 14 }),
        IndicatorSpec::new(
            "bb",
            IndicatorKind::Bollinger {
                period: 20,
                std_dev: 2.0,
            },
        ),
        IndicatorSpec::new("price", IndicatorKind::Price),
    ];
    oversold.entry.signal = Some(SignalGroupConfig::any(vec![
        SignalCondition::new("rsi", Comparison::Lt, 25.0),
        SignalCondition::against("price", Comparison::Lt, "bb", Some("lower")),
    ]));
    oversold.entry.max_wait = MaxWait::Candles(360);
    oversold.exit.targets = vec![ProfitTarget::new(1.0, 0.12)];
    oversold.exit.stop_loss_pct = Some(0.10);
    oversold.exit.time_exit = Some(TimeExitConfig { max_candles: 240 });
    oversold.fees = standard_fees;

    vec![ladder, dip, rebound, cross, oversold]
}
