//! Exit configuration and its compiled form.

use serde::{Deserialize, Serialize};

use crate::domain::PendingTarget;
use crate::error::ConfigError;
use crate::signals::{compile_group, IndicatorCatalog, SignalGroupConfig, SignalNode};

use super::tie_break::TieBreakPolicy;

/// One rung of the profit ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitTarget {
    /// Fraction of the original position closed at this rung.
    pub size_pct: f64,
    /// Profit over entry that triggers the rung (0.10 = +10%).
    pub profit_pct: f64,
}

impl ProfitTarget {
    pub fn new(size_pct: f64, profit_pct: f64) -> Self {
        Self {
            size_pct,
            profit_pct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingStopConfig {
    /// Distance of the stop below the highest high since entry.
    pub trail_pct: f64,
    /// Unrealised profit (at the candle high) required before trailing starts.
    #[serde(default)]
    pub activation_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeExitConfig {
    /// Candles after the entry candle before a forced exit at close.
    pub max_candles: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExitConfig {
    #[serde(default)]
    pub targets: Vec<ProfitTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_stop: Option<TrailingStopConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_exit: Option<TimeExitConfig>,
    #[serde(default)]
    pub break_even_after_first_target: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_signal: Option<SignalGroupConfig>,
    #[serde(default)]
    pub tie_break: TieBreakPolicy,
}

impl ExitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut total = 0.0;
        for (i, t) in self.targets.iter().enumerate() {
            if !t.size_pct.is_finite() || t.size_pct <= 0.0 || t.size_pct > 1.0 {
                return Err(ConfigError::param(
                    "targets",
                    format!("target {i}: size_pct must be in (0, 1], got {}", t.size_pct),
                ));
            }
            if !t.profit_pct.is_finite() || t.profit_pct <= 0.0 {
                return Err(ConfigError::param(
                    "targets",
                    format!("target {i}: profit_pct must be positive, got {}", t.profit_pct),
                ));
            }
            total += t.size_pct;
        }
        if total > 1.0 + 1e-9 {
            return Err(ConfigError::param(
                "targets",
                format!("target sizes sum to {total}, more than the whole position"),
            ));
        }

        if let Some(sl) = self.stop_loss_pct {
            if !sl.is_finite() || sl <= 0.0 || sl >= 1.0 {
                return Err(ConfigError::param(
                    "stop_loss",
                    format!("stop_loss_pct must be in (0, 1), got {sl}"),
                ));
            }
        }

        if let Some(ts) = self.trailing_stop {
            if !ts.trail_pct.is_finite() || ts.trail_pct <= 0.0 || ts.trail_pct >= 1.0 {
                return Err(ConfigError::param(
                    "trailing_stop",
                    format!("trail_pct must be in (0, 1), got {}", ts.trail_pct),
                ));
            }
            if !ts.activation_pct.is_finite() || ts.activation_pct < 0.0 {
                return Err(ConfigError::param(
                    "trailing_stop",
                    format!("activation_pct must be >= 0, got {}", ts.activation_pct),
                ));
            }
        }

        if let Some(te) = self.time_exit {
            if te.max_candles == 0 {
                return Err(ConfigError::param("time_exit", "max_candles must be >= 1"));
            }
        }

        if self.break_even_after_first_target && self.targets.is_empty() {
            return Err(ConfigError::param(
                "break_even",
                "break_even_after_first_target needs at least one target",
            ));
        }

        Ok(())
    }

    pub fn compile(&self, catalog: &IndicatorCatalog) -> Result<CompiledExit, ConfigError> {
        self.validate()?;

        let mut targets: Vec<(usize, ProfitTarget)> = self.targets.iter().copied().enumerate().collect();
        targets.sort_by(|a, b| a.1.profit_pct.total_cmp(&b.1.profit_pct));

        let exit_signal = self
            .exit_signal
            .as_ref()
            .map(|group| compile_group(group, catalog))
            .transpose()?;

        Ok(CompiledExit {
            targets,
            stop_loss_pct: self.stop_loss_pct,
            trailing_stop: self.trailing_stop,
            time_exit: self.time_exit,
            break_even_after_first_target: self.break_even_after_first_target,
            exit_signal,
            tie_break: self.tie_break,
        })
    }
}

/// Exit rules ready for the state machine. Targets are sorted ascending by
/// profit and keep their configured ordinal.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExit {
    pub targets: Vec<(usize, ProfitTarget)>,
    pub stop_loss_pct: Option<f64>,
    pub trailing_stop: Option<TrailingStopConfig>,
    pub time_exit: Option<TimeExitConfig>,
    pub break_even_after_first_target: bool,
    pub exit_signal: Option<SignalNode>,
    pub tie_break: TieBreakPolicy,
}

impl CompiledExit {
    /// Ladder prices for a position entered at `entry_price`.
    pub fn ladder(&self, entry_price: f64) -> Vec<PendingTarget> {
        self.targets
            .iter()
            .map(|(ordinal, t)| PendingTarget {
                ordinal: *ordinal,
                price: entry_price * (1.0 + t.profit_pct),
                size: t.size_pct,
            })
            .collect()
    }

    pub fn initial_stop(&self, entry_price: f64) -> Option<f64> {
        self.stop_loss_pct.map(|sl| entry_price * (1.0 - sl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(cfg: &ExitConfig) -> Result<CompiledExit, ConfigError> {
        cfg.compile(&IndicatorCatalog::new())
    }

    #[test]
    fn ladder_sorted_ascending_keeps_ordinals() {
        let cfg = ExitConfig {
            targets: vec![ProfitTarget::new(0.5, 0.10), ProfitTarget::new(0.5, 0.05)],
            ..Default::default()
        };
        let ladder = compile(&cfg).unwrap().ladder(2.0);
        assert_eq!(ladder[0].ordinal, 1);
        assert!((ladder[0].price - 2.1).abs() < 1e-12);
        assert_eq!(ladder[1].ordinal, 0);
        assert!((ladder[1].price - 2.2).abs() < 1e-12);
    }

    #[test]
    fn oversized_ladder_rejected() {
        let cfg = ExitConfig {
            targets: vec![ProfitTarget::new(0.7, 0.05), ProfitTarget::new(0.7, 0.10)],
            ..Default::default()
        };
        assert!(compile(&cfg).is_err());
    }

    #[test]
    fn stop_loss_bounds() {
        for bad in [0.0, 1.0, -0.1, f64::INFINITY] {
            let cfg = ExitConfig {
                stop_loss_pct: Some(bad),
                ..Default::default()
            };
            assert!(cfg.validate().is_err(), "{bad} accepted");
        }
        let ok = ExitConfig {
            stop_loss_pct: Some(0.1),
            ..Default::default()
        };
        assert!((compile(&ok).unwrap().initial_stop(1.0).unwrap() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn break_even_without_targets_rejected() {
        let cfg = ExitConfig {
            break_even_after_first_target: true,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_time_exit_rejected() {
        let cfg = ExitConfig {
            time_exit: Some(TimeExitConfig { max_candles: 0 }),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_from_toml_with_defaults() {
        let text = r#"
            stop_loss_pct = 0.1
            break_even_after_first_target = true

            [[targets]]
            size_pct = 0.5
            profit_pct = 0.05

            [[targets]]
            size_pct = 0.5
            profit_pct = 0.10

            [trailing_stop]
            trail_pct = 0.03
        "#;
        let cfg: ExitConfig = toml::from_str(text).unwrap();
        assert_eq!(cfg.targets.len(), 2);
        assert_eq!(cfg.tie_break, TieBreakPolicy::Conservative);
        assert_eq!(cfg.trailing_stop.unwrap().activation_pct, 0.0);
        assert!(cfg.validate().is_ok());
    }
}
