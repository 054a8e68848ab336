use std::fs;

use serde::Deserialize;
use tracing::warn;

/// User configuration, loaded from an optional YAML file. Anything missing
/// falls back to the defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory backing host-filesystem opens from the HLE layer.
    pub filesystem_root: String,
    /// Initial log filter (tracing EnvFilter syntax).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            filesystem_root: String::from("filesystem"),
            log_level: String::from("info"),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Config {
        match fs::read_to_string(path) {
            Ok(text) => match serde_yaml::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Invalid config file {} ({}), using defaults", path, e);
                    Config::default()
                }
            },
            Err(e) => {
                warn!("Unable to read config file {} ({}), using defaults", path, e);
                Config::default()
            }
        }
    }
}
