//! Configuration loading and parsing

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub midi_client_name: String,
    pub midi_port_name: String,
    /// Enable MIDI right after every (re)connection
    pub midi_on_connect: bool,
    pub read_timeout_ms: u64,
    pub probe_interval_ms: u64,
    pub actions: ActionCommands,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            midi_client_name: "prodikeys-rs".into(),
            midi_port_name: "Prodikeys MIDI Interface".into(),
            midi_on_connect: false,
            read_timeout_ms: 100,
            probe_interval_ms: 3000,
            actions: ActionCommands::default(),
        }
    }
}

/// Shell commands run for the launcher keys; empty disables a key
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActionCommands {
    pub calculator: String,
    pub documents: String,
    pub music: String,
    pub pictures: String,
}

impl Default for ActionCommands {
    fn default() -> Self {
        Self {
            calculator: "gnome-calculator".into(),
            documents: r#"xdg-open "$(xdg-user-dir DOCUMENTS)""#.into(),
            music: r#"xdg-open "$(xdg-user-dir MUSIC)""#.into(),
            pictures: r#"xdg-open "$(xdg-user-dir PICTURES)""#.into(),
        }
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = Self::load_from(&path)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    /// Get the default config path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("prodikeys-rs");
        Ok(config_dir.join("config.json"))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}
