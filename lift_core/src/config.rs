//! Configuration file support for liftlog.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/liftlog/config.toml`.

use crate::{CachePolicy, Error, Result, TrainingSchedule};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Weekly training schedule configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_training_days")]
    pub training_days: Vec<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            training_days: default_training_days(),
        }
    }
}

/// Cache freshness and re-entry timing configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u32,

    #[serde(default = "default_quick_reentry_window_ms")]
    pub quick_reentry_window_ms: u32,

    #[serde(default = "default_deferred_revalidate_delay_ms")]
    pub deferred_revalidate_delay_ms: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            quick_reentry_window_ms: default_quick_reentry_window_ms(),
            deferred_revalidate_delay_ms: default_deferred_revalidate_delay_ms(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("liftlog")
}

fn default_training_days() -> Vec<String> {
    vec!["monday".into(), "wednesday".into(), "friday".into()]
}

fn default_ttl_seconds() -> u32 {
    60
}

fn default_quick_reentry_window_ms() -> u32 {
    3000
}

fn default_deferred_revalidate_delay_ms() -> u32 {
    300
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("liftlog").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// The training schedule as a parsed weekday set
    pub fn training_schedule(&self) -> TrainingSchedule {
        TrainingSchedule::from_names(&self.schedule.training_days)
    }

    /// Cache timing as a [`CachePolicy`]
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            ttl: chrono::Duration::seconds(i64::from(self.cache.ttl_seconds)),
            quick_reentry_window: chrono::Duration::milliseconds(i64::from(
                self.cache.quick_reentry_window_ms,
            )),
            deferred_revalidate_delay: std::time::Duration::from_millis(u64::from(
                self.cache.deferred_revalidate_delay_ms,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cache.ttl_seconds, 60);
        assert_eq!(config.cache.quick_reentry_window_ms, 3000);
        assert_eq!(config.cache.deferred_revalidate_delay_ms, 300);
        assert_eq!(config.schedule.training_days.len(), 3);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.cache.ttl_seconds, parsed.cache.ttl_seconds);
        assert_eq!(
            config.schedule.training_days,
            parsed.schedule.training_days
        );
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[cache]
ttl_seconds = 120
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.cache.ttl_seconds, 120);
        assert_eq!(config.cache.quick_reentry_window_ms, 3000); // default
    }

    #[test]
    fn test_training_schedule_parsing() {
        let toml_str = r#"
[schedule]
training_days = ["tuesday", "thursday", "banana"]
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let schedule = config.training_schedule();
        assert!(schedule.contains(Weekday::Tue));
        assert!(schedule.contains(Weekday::Thu));
        assert!(!schedule.contains(Weekday::Mon));
    }
}
