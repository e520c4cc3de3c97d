//! Configuration management (framescope.toml)
//!
//! Settings are stored in TOML format in the platform-specific config
//! directory. Every section is optional; missing keys fall back to defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name looked up inside [`config_dir`].
pub const CONFIG_FILE: &str = "framescope.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Framescope configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Capture-side limits
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Replay-side behaviour
    #[serde(default)]
    pub replay: ReplayConfig,
}

/// Capture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Deepest descriptor nesting accepted during substitution (default: 64)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Keep records of destroyed resources in later snapshots (default: false)
    #[serde(default)]
    pub keep_destroyed_records: bool,
}

/// Replay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Add COPY_SRC to every reconstructed texture so it can be read back (default: true)
    #[serde(default = "default_true")]
    pub force_copy_src: bool,
    /// Deepest descriptor nesting accepted during resolution (default: 64)
    #[serde(default = "default_max_depth")]
    pub max_resolve_depth: usize,
    /// A `submit` without ids submits every pending command buffer (default: true)
    #[serde(default = "default_true")]
    pub submit_all_when_empty: bool,
}

fn default_max_depth() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            keep_destroyed_records: false,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            force_copy_src: default_true(),
            max_resolve_depth: default_max_depth(),
            submit_all_when_empty: default_true(),
        }
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\Framescope\config`
/// On macOS: `~/Library/Application Support/io.framescope.Framescope`
/// On Linux: `~/.config/Framescope`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.framescope", "", "Framescope")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

impl Config {
    /// Loads `framescope.toml` from the config directory.
    ///
    /// Returns defaults if the file doesn't exist or cannot be parsed.
    pub fn load() -> Config {
        config_dir()
            .and_then(|dir| std::fs::read_to_string(dir.join(CONFIG_FILE)).ok())
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Loads an explicit config file, reporting every failure.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, content).map_err(io_err)
    }

    /// Writes the config to the platform config directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        match config_dir() {
            Some(dir) => self.save_to(&dir.join(CONFIG_FILE)),
            None => Ok(()),
        }
    }
}
