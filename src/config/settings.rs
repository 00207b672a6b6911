use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_target_days() -> u32 {
    30
}
fn default_increment() -> String {
    "+1".to_string()
}
fn default_threshold() -> u32 {
    50
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Trailing window for new habits unless --target-days overrides it.
    #[serde(default = "default_target_days")]
    pub default_target_days: u32,
    /// Value applied on a bare `log` for new habits.
    #[serde(default = "default_increment")]
    pub default_increment: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            default_target_days: default_target_days(),
            default_increment: default_increment(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Warn when a habit's rolling percentage falls below this.
    #[serde(default = "default_threshold")]
    pub threshold_percent: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_percent: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

impl AppConfig {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "", "ritmo").context("Could not determine project directories")
    }

    pub fn config_path() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn db_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("ritmo.db"))
    }

    /// Load the config, writing the defaults to disk on first run so the
    /// user has a file to edit.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }
        let content =
            std::fs::read_to_string(&path).with_context(|| format!("Reading {:?}", path))?;
        let config: AppConfig = toml::from_str(&content).context("Parsing config.toml")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).context("Serializing config")?;
        std::fs::write(&path, content).with_context(|| format!("Writing {:?}", path))?;
        Ok(())
    }

    pub fn ensure_data_dir() -> Result<PathBuf> {
        let dir = Self::data_dir()?;
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.tracking.default_target_days, 30);
        assert_eq!(parsed.tracking.default_increment, "+1");
        assert!(parsed.alerts.enabled);
        assert_eq!(parsed.alerts.threshold_percent, 50);
    }

    #[test]
    fn empty_file_yields_the_defaults() {
        let parsed: AppConfig = toml::from_str("").unwrap();
        assert_eq!(parsed.tracking.default_target_days, 30);
    }
}
