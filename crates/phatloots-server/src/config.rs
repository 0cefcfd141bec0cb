use phatloots_engine::LinkConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub links: LinkConfig,
    #[serde(default)]
    pub respawn: RespawnSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
pub struct StorageSection {
    /// Root of the data directory. Tables live in `<directory>/loot_tables`.
    #[serde(default = "default_storage_directory")]
    pub directory: String,
}

fn default_storage_directory() -> String {
    "plugins/PhatLoots".into()
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            directory: default_storage_directory(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RespawnSection {
    /// How often broken containers are checked. Default: 1000 (1 second).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

impl Default for RespawnSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ServerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Like [`ServerConfig::load`], but a missing file means all defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }
}
