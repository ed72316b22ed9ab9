use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct NodeSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PasteOffset {
    pub x: f64,
    pub y: f64,
}

/// Engine settings, stored as `config.toml` in the platform config directory.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// env_logger filter used by the CLI. `RUST_LOG` takes precedence.
    pub log_filter: String,
    /// Version written into serialized documents.
    pub document_version: String,
    /// Margin around member nodes when fitting a group.
    pub group_padding: f64,
    /// Node footprint used for group layout.
    pub default_node_size: NodeSize,
    /// Paste location used when no pointer position is given.
    pub paste_offset: PasteOffset,
    /// Bounded capacity of each direction of an operation channel.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            document_version: crate::io::DOCUMENT_VERSION.to_string(),
            group_padding: 20.0,
            default_node_size: NodeSize {
                width: 180.0,
                height: 120.0,
            },
            paste_offset: PasteOffset { x: 40.0, y: 40.0 },
            channel_capacity: 64,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, LibraryError> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String, LibraryError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load_from(path: &Path) -> Result<Self, LibraryError> {
        let toml_str = fs::read_to_string(path)?;
        Self::from_toml_str(&toml_str)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), LibraryError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

fn get_config_path() -> Option<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "nodeflow", "nodeflow") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            if let Err(e) = fs::create_dir_all(config_dir) {
                error!("Failed to create config directory: {}", e);
                return None;
            }
        }
        return Some(config_dir.join("config.toml"));
    }
    None
}

pub fn save_config(config: &EngineConfig) {
    if let Some(path) = get_config_path() {
        match config.save_to(&path) {
            Ok(()) => info!("Config saved to {}", path.display()),
            Err(e) => error!("Failed to write config file: {}", e),
        }
    }
}

pub fn load_config() -> EngineConfig {
    if let Some(path) = get_config_path() {
        if path.exists() {
            match EngineConfig::load_from(&path) {
                Ok(config) => return config,
                Err(e) => warn!("Failed to load config file, using defaults: {}", e),
            }
        }
    }
    // Return default if file doesn't exist or on any error
    EngineConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("group_padding = 8.0\n").unwrap();
        assert_eq!(config.group_padding, 8.0);
        assert_eq!(config.channel_capacity, 64);
        assert_eq!(config.document_version, "1.0");
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = EngineConfig::default();
        config.paste_offset = PasteOffset { x: 5.0, y: -5.0 };
        config.log_filter = "nodeflow=debug".to_string();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("[paste_offset]"));
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let err = EngineConfig::from_toml_str("channel_capacity = \"many\"").unwrap_err();
        assert!(matches!(err, LibraryError::Toml(_)));
    }
}
