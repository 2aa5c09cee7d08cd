//! Host configuration, loaded from TOML.

use std::path::{Path, PathBuf};
use std::{env, fs};

use condrv::records::Coord;
use serde::Deserialize;
use thiserror::Error;

use crate::screen::{DEFAULT_COLOR_TABLE, ScreenBufferSettings};

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "CONDRV_HOST_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error while accessing `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Full host configuration.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Console geometry and rendering defaults
    pub console: ConsoleConfig,
    /// Host policy switches
    pub host: HostConfig,
}

/// The `[console]` section.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Buffer and window width in cells
    pub columns: i16,
    /// Buffer and window height in cells
    pub rows: i16,
    /// Cursor height as a percent of the cell (1..100)
    pub cursor_size: u32,
    /// Default legacy attribute word
    pub default_attributes: u16,
}

/// The `[host]` section.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HostConfig {
    /// Hand the session to the inbox legacy host instead of serving it
    pub legacy_activation: bool,
    /// Opt into UIAccess routing at startup
    pub allow_ui_access: bool,
    /// Client command to launch when none is supplied on the command line
    pub default_client: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            columns: 80,
            rows: 25,
            cursor_size: 25,
            default_attributes: 0x07,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            legacy_activation: false,
            allow_ui_access: false,
            default_client: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            console: ConsoleConfig::default(),
            host: HostConfig::default(),
        }
    }
}

impl Config {
    /// Load, parse, and validate a config file. A missing file yields the
    /// defaults so the host runs without any configuration present.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Config = toml::from_str(&text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.console.columns <= 0 || self.console.rows <= 0 {
            return Err(ConfigError::Validation(format!(
                "console geometry must be positive, got {}x{}",
                self.console.columns, self.console.rows
            )));
        }
        if !(1..=100).contains(&self.console.cursor_size) {
            return Err(ConfigError::Validation(format!(
                "console.cursor_size must be within 1..=100, got {}",
                self.console.cursor_size
            )));
        }
        Ok(())
    }

    /// Screen-buffer construction parameters for this configuration.
    pub fn screen_buffer_settings(&self) -> ScreenBufferSettings {
        ScreenBufferSettings {
            buffer_size: Coord::new(self.console.columns, self.console.rows),
            window_size: Coord::new(self.console.columns, self.console.rows),
            cursor_position: Coord::new(0, 0),
            text_attributes: self.console.default_attributes,
            cursor_size: self.console.cursor_size,
            cursor_visible: true,
            color_table: DEFAULT_COLOR_TABLE,
        }
    }

    #[cfg(test)]
    pub fn from_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }
}

/// Find the config file: an environment override first, then a
/// `config.toml` next to the running executable.
///
/// Never panics; a path is returned even when the file does not exist so
/// the caller can surface a clean configuration error.
pub fn find_config_file() -> PathBuf {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }

    let mut exe_path = env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
    exe_path.pop();
    exe_path.push("config.toml");
    exe_path
}
