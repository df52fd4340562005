use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;

const CONFIG_FILE: &str = "apollostats.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheSettings,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub refresh_interval_secs: u64,
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".into(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            refresh_interval_secs: defaults.refresh_interval.as_secs(),
            shutdown_grace_secs: defaults.shutdown_grace.as_secs(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stats.json"),
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from `apollostats.toml` in the working directory.
    /// A missing default file is created with default values.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let path = Path::new(CONFIG_FILE);
                if path.exists() {
                    Self::read(path)?
                } else {
                    let config = Self::default();
                    let content = toml::to_string_pretty(&config)?;
                    fs::write(path, content)
                        .with_context(|| format!("failed to write default config {:?}", path))?;
                    config
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read config {:?}", path))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("invalid config {:?}", path))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.refresh_interval_secs == 0 {
            anyhow::bail!("[cache] refresh_interval_secs must be greater than zero");
        }
        if self.cache.shutdown_grace_secs == 0 {
            anyhow::bail!("[cache] shutdown_grace_secs must be greater than zero");
        }
        Ok(())
    }
}
