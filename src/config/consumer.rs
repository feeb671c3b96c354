// src/config/consumer.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scoring::LevelThresholds;

pub const ENV_CONFIG_PATH: &str = "CONSUMER_CONFIG_PATH";
pub const ENV_DATA_FILE: &str = "CONSUMER_DATA_FILE";
pub const ENV_DB_FILE: &str = "CONSUMER_DB_FILE";
pub const ENV_POLL_INTERVAL_SECS: &str = "CONSUMER_POLL_INTERVAL_SECS";

pub const DEFAULT_CONFIG_PATH: &str = "config/consumer.toml";

fn default_data_file() -> PathBuf {
    PathBuf::from("data/project_live.json")
}
fn default_db_file() -> PathBuf {
    PathBuf::from("data/meyer_engagement_insights.sqlite")
}
fn default_poll_interval_secs() -> u64 {
    2
}
fn default_max_failures() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsumerConfig {
    /// JSON-lines file appended to by the producer.
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    /// SQLite database receiving `engagement_insights` rows.
    #[serde(default = "default_db_file")]
    pub db_file: PathBuf,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Consecutive non-"missing file" read failures before the loop stops.
    #[serde(default = "default_max_failures")]
    pub max_consecutive_source_failures: u32,
    /// Consecutive store failures before the loop stops.
    #[serde(default = "default_max_failures")]
    pub max_consecutive_store_failures: u32,
    #[serde(default)]
    pub thresholds: LevelThresholds,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            db_file: default_db_file(),
            poll_interval_secs: default_poll_interval_secs(),
            max_consecutive_source_failures: default_max_failures(),
            max_consecutive_store_failures: default_max_failures(),
            thresholds: LevelThresholds::default(),
        }
    }
}

impl ConsumerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Load from an explicit TOML file. Missing keys take defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading consumer config from {}", path.display()))?;
        let cfg: ConsumerConfig = toml::from_str(&content)
            .with_context(|| format!("parsing consumer config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolve configuration:
    /// 1) $CONSUMER_CONFIG_PATH
    /// 2) config/consumer.toml
    /// 3) built-in defaults
    ///
    /// then apply $CONSUMER_DATA_FILE / $CONSUMER_DB_FILE / $CONSUMER_POLL_INTERVAL_SECS.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                ));
            }
            Self::load_from(&pb)?
        } else {
            let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
            if fallback.exists() {
                Self::load_from(&fallback)?
            } else {
                Self::default()
            }
        };

        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var(ENV_DATA_FILE) {
            self.data_file = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(ENV_DB_FILE) {
            self.db_file = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(ENV_POLL_INTERVAL_SECS) {
            self.poll_interval_secs = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_POLL_INTERVAL_SECS}={v:?} is not a number"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }
        if self.max_consecutive_source_failures == 0 || self.max_consecutive_store_failures == 0 {
            bail!("failure limits must be at least 1");
        }
        if !self.thresholds.is_ordered() {
            bail!(
                "engagement thresholds must be descending (high {} > medium {} > low {})",
                self.thresholds.high,
                self.thresholds.medium,
                self.thresholds.low
            );
        }
        Ok(())
    }
}
