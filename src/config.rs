//! Game configuration — judge windows, scoring, grades and stage layout,
//! loaded from ~/.beatword/config.yaml.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::judge::{GradeThresholds, JudgeWindows, ScoreRules};
use crate::run::stage::StageDistribution;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] io::Error),
    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunable game constants. Missing fields take their reference defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub judge: JudgeWindows,
    pub scoring: ScoreRules,
    pub grades: GradeThresholds,
    pub stages: StageDistribution,
    /// Pause between finishing a stage and starting the next.
    pub transition_delay_ms: f64,
    /// When set, a countdown starts play by itself after this long.
    pub countdown_ms: Option<f64>,
    /// Lead-in of the backing track to skip.
    pub start_offset_ms: f64,
    /// Period of the driving tick loop.
    pub tick_interval_ms: u64,
    /// Backing track volume, 0.0 to 1.0.
    pub volume: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            judge: JudgeWindows::default(),
            scoring: ScoreRules::default(),
            grades: GradeThresholds::default(),
            stages: StageDistribution::default(),
            transition_delay_ms: 2000.0,
            countdown_ms: None,
            start_offset_ms: 0.0,
            tick_interval_ms: 16,
            volume: 1.0,
        }
    }
}

/// Default path for the config file.
pub fn default_config_path() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".beatword");
    path.push("config.yaml");
    path
}

impl GameConfig {
    /// Load from the standard path, falling back to defaults if the file is
    /// missing or unreadable.
    pub fn load() -> Self {
        match Self::load_from(&default_config_path()) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("ignoring config file: {e}");
                Self::default()
            }
        }
    }

    /// Load and validate a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as YAML, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let JudgeWindows {
            perfect_ms,
            good_ms,
        } = self.judge;
        if !(perfect_ms > 0.0 && good_ms >= perfect_ms) {
            return Err(ConfigError::Invalid(format!(
                "judge windows must satisfy 0 < perfect ({perfect_ms}) <= good ({good_ms})"
            )));
        }
        if !(self.transition_delay_ms >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "transition delay {} must not be negative",
                self.transition_delay_ms
            )));
        }
        if self.countdown_ms.is_some_and(|c| !(c >= 0.0)) {
            return Err(ConfigError::Invalid("countdown must not be negative".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick interval must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(ConfigError::Invalid(format!(
                "volume {} must be within 0.0..=1.0",
                self.volume
            )));
        }
        self.stages
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
