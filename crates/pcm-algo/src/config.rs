//! Scenario configuration consumed by the rolling-horizon loop.

use serde::{Deserialize, Serialize};

use crate::backends::SolverOptions;
use crate::error::ConfigError;

fn default_interval_length() -> usize {
    24
}

fn default_one() -> usize {
    1
}

fn default_shed_penalty() -> f64 {
    9000.0
}

/// Unserved-demand slack, priced per MWh.
///
/// Only ever switched on up front; the loop never enables it to rescue an
/// infeasible interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadShed {
    #[serde(default)]
    pub enabled: bool,
    /// Penalty per shed MWh
    #[serde(default = "default_shed_penalty")]
    pub penalty: f64,
}

impl Default for LoadShed {
    fn default() -> Self {
        Self {
            enabled: false,
            penalty: default_shed_penalty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Hours per interval
    #[serde(default = "default_interval_length")]
    pub interval_length: usize,
    /// Number of intervals to solve
    #[serde(default = "default_one")]
    pub n_interval: usize,
    /// First hour of the first interval (1-based row of the profile tables)
    #[serde(default = "default_one")]
    pub start_index: usize,
    #[serde(default)]
    pub solver: SolverOptions,
    #[serde(default)]
    pub storage_enabled: bool,
    #[serde(default)]
    pub flexibility_enabled: bool,
    /// Ramp-limit the very first hour against each generator's initial dispatch
    #[serde(default)]
    pub initial_ramp: bool,
    #[serde(default)]
    pub load_shed: LoadShed,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            interval_length: default_interval_length(),
            n_interval: 1,
            start_index: 1,
            solver: SolverOptions::default(),
            storage_enabled: false,
            flexibility_enabled: false,
            initial_ramp: false,
            load_shed: LoadShed::default(),
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_length == 0 {
            return Err(ConfigError::ZeroIntervalLength);
        }
        if self.n_interval == 0 {
            return Err(ConfigError::ZeroIntervalCount);
        }
        if self.start_index == 0 {
            return Err(ConfigError::ZeroStartIndex);
        }
        if self.solver.threads == Some(0) {
            return Err(ConfigError::ZeroThreads);
        }
        let penalty = self.load_shed.penalty;
        if !penalty.is_finite() || penalty < 0.0 {
            return Err(ConfigError::InvalidPenalty(penalty));
        }
        if self.checked_end_index().is_none() {
            return Err(ConfigError::HorizonOverflow {
                start_index: self.start_index,
                interval_length: self.interval_length,
                n_interval: self.n_interval,
            });
        }
        Ok(())
    }

    fn checked_end_index(&self) -> Option<usize> {
        self.interval_length
            .checked_mul(self.n_interval)?
            .checked_add(self.start_index)?
            .checked_sub(1)
    }

    /// Last absolute hour the scenario touches.
    ///
    /// Saturates at `usize::MAX` for horizons [`validate`](Self::validate)
    /// rejects.
    pub fn end_index(&self) -> usize {
        self.checked_end_index().unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ScenarioConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.end_index(), 24);
        assert_eq!(config.load_shed.penalty, 9000.0);
    }

    #[test]
    fn test_rejects_degenerate_horizon() {
        let config = ScenarioConfig {
            interval_length: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroIntervalLength));

        let config = ScenarioConfig {
            n_interval: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroIntervalCount));

        let config = ScenarioConfig {
            start_index: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroStartIndex));
    }

    #[test]
    fn test_rejects_bad_penalty_and_threads() {
        let mut config = ScenarioConfig::default();
        config.load_shed.penalty = -1.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPenalty(-1.0)));

        let mut config = ScenarioConfig::default();
        config.solver.threads = Some(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroThreads));
    }

    #[test]
    fn test_rejects_overflowing_horizon() {
        let config = ScenarioConfig {
            interval_length: usize::MAX / 2,
            n_interval: 3,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HorizonOverflow { n_interval: 3, .. })
        ));
        assert_eq!(config.end_index(), usize::MAX);

        let config = ScenarioConfig {
            interval_length: 1,
            n_interval: 1,
            start_index: usize::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ScenarioConfig {
            interval_length: usize::MAX / 2,
            n_interval: 2,
            start_index: 1,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScenarioConfig = serde_json::from_str(
            r#"{"interval_length": 6, "n_interval": 4, "load_shed": {"enabled": true}}"#,
        )
        .unwrap();
        assert_eq!(config.start_index, 1);
        assert_eq!(config.end_index(), 24);
        assert!(config.load_shed.enabled);
        assert_eq!(config.load_shed.penalty, 9000.0);
    }
}
