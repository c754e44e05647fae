use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    counter::BigCount,
    engine::EngineSettings,
    params::{ModelConfig, ParameterSet},
};

fn default_years() -> u64 {
    20
}

fn default_snapshot_interval_years() -> u64 {
    0
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_replicates() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default)]
    pub years: Option<u64>,
    pub founders: Founders,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default = "default_snapshot_interval_years")]
    pub snapshot_interval_years: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub experiments: Vec<SeriesSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Founders {
    pub females: BigCount,
    pub males: BigCount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// One batch of replicate runs sharing founders and horizon.
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesSpec {
    pub label: String,
    pub females: BigCount,
    pub males: BigCount,
    pub years: u64,
    #[serde(default = "default_replicates")]
    pub replicates: u32,
    /// First replicate seed; falls back to the scenario seed.
    #[serde(default)]
    pub seed: Option<u64>,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn parameters(&self) -> Result<ParameterSet> {
        ParameterSet::derive(&self.model)
            .with_context(|| format!("Invalid model parameters in scenario '{}'", self.name))
    }

    pub fn years(&self, override_years: Option<u64>) -> u64 {
        override_years.or(self.years).unwrap_or_else(default_years)
    }

    pub fn engine_settings(
        &self,
        seed_override: Option<u64>,
        snapshot_interval_years: Option<u64>,
        snapshot_dir: Option<PathBuf>,
    ) -> EngineSettings {
        let mut settings = EngineSettings::new(self.name.clone(), seed_override.unwrap_or(self.seed));
        settings.snapshot_interval_years =
            snapshot_interval_years.unwrap_or(self.snapshot_interval_years);
        if let Some(dir) = snapshot_dir {
            settings.snapshot_dir = dir;
        }
        settings
    }
}
