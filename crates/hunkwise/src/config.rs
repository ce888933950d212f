use anyhow::{Context, Result};
use hunkwise_core::DiffOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub diff: DiffConfig,
    pub review: ReviewConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Compare lines with surrounding whitespace trimmed
    pub ignore_whitespace: bool,
    /// Budget for a single line diff, in milliseconds
    pub max_computation_time_ms: u64,
    pub compute_moves: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Quiet period after a human edit before hunks are recomputed
    pub debounce_ms: u64,
    /// Lines appended per step by `hunkwise stream`
    pub stream_chunk_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            diff: DiffConfig::default(),
            review: ReviewConfig::default(),
        }
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            ignore_whitespace: false,
            max_computation_time_ms: 3000,
            compute_moves: false,
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            stream_chunk_lines: 1,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path(),
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("hunkwise")
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.diff.max_computation_time_ms >= 1,
            "max_computation_time_ms must be at least 1"
        );
        anyhow::ensure!(
            self.review.debounce_ms <= 10_000,
            "debounce_ms must be at most 10000"
        );
        anyhow::ensure!(
            self.review.stream_chunk_lines >= 1,
            "stream_chunk_lines must be at least 1"
        );
        Ok(())
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions::default()
            .with_ignore_whitespace(self.diff.ignore_whitespace)
            .with_max_computation_time(Duration::from_millis(self.diff.max_computation_time_ms))
            .with_compute_moves(self.diff.compute_moves)
    }

    pub fn recompute_delay(&self) -> Duration {
        Duration::from_millis(self.review.debounce_ms)
    }
}
