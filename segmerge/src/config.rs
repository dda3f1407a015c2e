use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::log_setup::MAX_VERBOSITY;

use crate::criteria::TraversingConfig;
use crate::merger::MergeOptions;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Verbosity {0} is out of range 0..=4")]
    Verbosity(u8),
    #[error("Size penalty must be a finite non-negative number, got {0}")]
    SizePenalty(f64),
}

/// Run configuration, usually read from a YAML file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    pub verbosity: u8,
    /// Iterations between progress lines; 0 disables them.
    pub progress_interval: usize,
    pub criterion: TraversingConfig,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            verbosity: 2,
            progress_interval: 1000,
            criterion: TraversingConfig::default(),
        }
    }
}

impl MergeConfig {
    pub fn from_file(path: &str) -> anyhow::Result<MergeConfig> {
        let config: MergeConfig = common::read_file(path)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.verbosity > MAX_VERBOSITY {
            return Err(ConfigError::Verbosity(self.verbosity));
        }
        let penalty = self.criterion.size_penalty;
        if !penalty.is_finite() || penalty < 0.0 {
            return Err(ConfigError::SizePenalty(penalty));
        }

        Ok(())
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            progress_interval: self.progress_interval,
        }
    }
}
