use crate::driver::simulation::CourseConfig;
use crate::driver::TrialLimits;
use crate::evolution::runner::RunnerConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid [{section}] settings: {reason}")]
    Invalid { section: &'static str, reason: String },
}

/// Settings of a whole evolution run.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub runner: RunnerConfig,
    pub trial: TrialLimits,
    pub run: RunConfig,
    pub course: CourseConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RunConfig {
    /// Stop once this generation has been evaluated without a winner
    pub max_generations: u32,
    /// Where each generation is exported
    pub snapshot_path: PathBuf,
    /// Start from the snapshot at `snapshot_path` if it can be read
    pub resume: bool,
    /// Seed for reproducible runs; OS entropy when absent
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_generations: 200,
            snapshot_path: PathBuf::from("generation.json"),
            resume: false,
            seed: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.runner.validate().map_err(|e| ConfigError::Invalid {
            section: "runner",
            reason: e.to_string(),
        })?;
        self.course.validate().map_err(|reason| ConfigError::Invalid {
            section: "course",
            reason,
        })?;
        if self.run.max_generations < 1 {
            return Err(ConfigError::Invalid {
                section: "run",
                reason: "max_generations must be at least 1".to_string(),
            });
        }
        if self.course.start_position < self.trial.min_position {
            return Err(ConfigError::Invalid {
                section: "trial",
                reason: format!(
                    "min_position {} is ahead of the course start {}",
                    self.trial.min_position, self.course.start_position
                ),
            });
        }
        Ok(())
    }
}
