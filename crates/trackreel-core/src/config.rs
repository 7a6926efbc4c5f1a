//! Service configuration management.
//!
//! Configuration is a JSON file, by default at
//! `~/.config/trackreel/config.json`. The renderer script path and the map
//! API key have no sensible defaults and must be present; everything else
//! falls back to a default.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/state directory paths
const APP_NAME: &str = "trackreel";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the per-user state tree.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Interpreter the renderer script is run with.
    #[serde(default = "default_renderer_command")]
    pub renderer_command: String,
    /// Path to the renderer entry point. Required.
    #[serde(default)]
    pub renderer_script: PathBuf,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    /// Static-map API key passed through to the renderer. Required.
    #[serde(default)]
    pub google_map_key: String,
    #[serde(default = "default_map_type")]
    pub google_map_type: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.renderer_script.as_os_str().is_empty() {
            bail!("Config field 'renderer_script' is required");
        }
        if self.google_map_key.is_empty() {
            bail!("Config field 'google_map_key' is required");
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

fn default_work_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_NAME).join("work"))
        .unwrap_or_else(|| PathBuf::from("./work"))
}

fn default_renderer_command() -> String {
    "python".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_map_type() -> String {
    "satellite".to_string()
}
