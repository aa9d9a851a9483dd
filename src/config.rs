use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use backon::ConstantBuilder;
use serde::Deserialize;

pub const DB_FILE: &str = "./env-poller.db";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub poller: PollerConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Fetch attempts per poll cycle, including the first one.
    pub retry_count: u32,
    pub retry_delay_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay_ms: 0,
        }
    }
}

impl PollerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn backoff(&self) -> ConstantBuilder {
        let retries = self.retry_count.saturating_sub(1) as usize;
        ConstantBuilder::default()
            .with_delay(self.retry_delay())
            .with_max_times(retries)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DB_FILE),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, anyhow::Error> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.poller.retry_count == 0 {
            anyhow::bail!("poller.retry_count must be at least 1");
        }
        crate::logging::parse_level(&self.logging.level)?;
        Ok(())
    }
}
