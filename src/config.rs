//! Configuration management for autowiz

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::data::{Chord, Key};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Storage locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Playback defaults
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// Hotkey chords
    #[serde(default)]
    pub hotkeys: HotkeyConfig,

    /// Whether the user has acknowledged the usage terms;
    /// absent means not acknowledged
    #[serde(default)]
    pub accepted_terms: bool,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding persisted recordings; defaults to the per-user
    /// data directory when unset
    #[serde(default)]
    pub recordings_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Default timing scale
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Default looping behavior
    #[serde(default = "default_loop", rename = "loop")]
    pub looped: bool,

    /// Cancellable-wait slice in milliseconds
    #[serde(default = "default_quantum_ms")]
    pub quantum_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    /// Chord that stops recording or playback
    #[serde(default = "default_stop_chord")]
    pub stop: Vec<String>,

    /// Chord that starts recording when idle
    #[serde(default = "default_record_chord")]
    pub record: Vec<String>,
}

// Default value functions
fn default_speed() -> f64 {
    1.0
}

fn default_loop() -> bool {
    // The original tool loops by default
    true
}

fn default_quantum_ms() -> u64 {
    10
}

fn default_stop_chord() -> Vec<String> {
    vec!["Key.esc".to_string()]
}

fn default_record_chord() -> Vec<String> {
    vec!["r".to_string()]
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            looped: default_loop(),
            quantum_ms: default_quantum_ms(),
        }
    }
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            stop: default_stop_chord(),
            record: default_record_chord(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            playback: PlaybackConfig::default(),
            hotkeys: HotkeyConfig::default(),
            accepted_terms: false,
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location or create the default
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let mut config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            config.config_path = Some(config_path);
            Ok(config)
        } else {
            let mut config = Config::default();
            config.config_path = Some(config_path);
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = match &self.config_path {
            Some(path) => path.clone(),
            None => Self::default_config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Mark the usage terms as acknowledged and persist the flag
    pub fn accept_terms(&mut self) -> Result<()> {
        self.accepted_terms = true;
        self.save()
    }

    /// Directory holding persisted recordings
    pub fn recordings_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage.recordings_dir {
            return Ok(dir.clone());
        }
        let proj_dirs = directories::ProjectDirs::from("dev", "autowiz", "autowiz")
            .context("Failed to determine data directory")?;
        Ok(proj_dirs.data_dir().join("recordings"))
    }

    /// Chord that stops recording or playback
    pub fn stop_chord(&self) -> Result<Chord> {
        parse_chord(&self.hotkeys.stop).context("Invalid stop hotkey in config")
    }

    /// Chord that starts recording
    pub fn record_chord(&self) -> Result<Chord> {
        parse_chord(&self.hotkeys.record).context("Invalid record hotkey in config")
    }

    /// Cancellable-wait slice
    pub fn quantum(&self) -> Duration {
        Duration::from_millis(self.playback.quantum_ms.max(1))
    }

    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "autowiz", "autowiz")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}

fn parse_chord(names: &[String]) -> Result<Chord> {
    let keys = names
        .iter()
        .map(|name| Key::parse(name))
        .collect::<std::result::Result<Vec<Key>, _>>()?;
    anyhow::ensure!(!keys.is_empty(), "chord has no keys");
    Ok(Chord::new(keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NamedKey;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.playback.speed, 1.0);
        assert!(config.playback.looped);
        assert_eq!(config.playback.quantum_ms, 10);
        assert!(!config.accepted_terms);
        assert_eq!(config.hotkeys.stop, vec!["Key.esc".to_string()]);
    }

    #[test]
    fn test_default_chords_parse() {
        let config = Config::default();
        let stop = config.stop_chord().unwrap();
        assert!(stop.contains(&Key::Named(NamedKey::Escape)));
        let record = config.record_chord().unwrap();
        assert!(record.contains(&Key::Char('r')));
    }

    #[test]
    fn test_loop_key_round_trips() {
        let config = Config {
            playback: PlaybackConfig {
                looped: false,
                ..PlaybackConfig::default()
            },
            ..Config::default()
        };
        let toml_text = toml::to_string_pretty(&config).unwrap();
        assert!(toml_text.contains("loop = false"));
        let parsed: Config = toml::from_str(&toml_text).unwrap();
        assert!(!parsed.playback.looped);
    }

    #[test]
    fn test_bad_chord_is_rejected() {
        let config = Config {
            hotkeys: HotkeyConfig {
                stop: vec!["Key.warp".to_string()],
                ..HotkeyConfig::default()
            },
            ..Config::default()
        };
        assert!(config.stop_chord().is_err());
    }
}
