//! Bench configuration file (`ic7447.toml`).
//!
//! Optional TOML file holding the default supply rails, control levels and
//! output format for the `ic7447` binary. CLI arguments always override
//! values from the file.
//!
//! ```toml
//! [rails]
//! pwr = true
//! gnd = false
//! terminals = 16
//!
//! [controls]
//! lt = true
//! rbi = false
//!
//! [output]
//! format = "json"
//! ```

use crate::ic::Rails;
use crate::ic7447::{Controls, TERMINAL_COUNT};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const FILE_NAME: &str = "ic7447.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Contents of `ic7447.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub rails: RailsConfig,
    pub controls: ControlsConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RailsConfig {
    pub pwr: Option<bool>,
    pub gnd: Option<bool>,
    /// Package terminal count.
    pub terminals: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Lamp test level, active low.
    pub lt: Option<bool>,
    /// Ripple-blanking input level, active low.
    pub rbi: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl BenchConfig {
    /// Search the working directory and its parents for `ic7447.toml`.
    pub fn discover() -> Option<(Self, PathBuf)> {
        let cwd = std::env::current_dir().ok()?;
        Self::discover_from(&cwd)
    }

    /// Search `start` and its parents. A file that fails to parse is skipped
    /// with a warning and the defaults apply.
    pub fn discover_from(start: &Path) -> Option<(Self, PathBuf)> {
        let mut dir = start;
        loop {
            let candidate = dir.join(FILE_NAME);
            if candidate.is_file() {
                return match Self::load(&candidate) {
                    Ok(config) => Some((config, candidate)),
                    Err(e) => {
                        warn!("ignoring {}: {e}", candidate.display());
                        None
                    }
                };
            }
            dir = dir.parent()?;
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Configured rails; unset values default to a live chip.
    pub fn rails(&self) -> Rails {
        let live = Rails::live();
        Rails::new(
            self.rails.pwr.unwrap_or(live.pwr),
            self.rails.gnd.unwrap_or(live.gnd),
        )
    }

    pub fn terminals(&self) -> u16 {
        self.rails.terminals.unwrap_or(TERMINAL_COUNT)
    }

    /// Configured controls; unset values are inactive (HIGH).
    pub fn controls(&self) -> Controls {
        Controls {
            lt: self.controls.lt.unwrap_or(true),
            rbi: self.controls.rbi.unwrap_or(true),
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.output.format.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_file_means_defaults() {
        let config: BenchConfig = toml::from_str("").unwrap();
        assert_eq!(config, BenchConfig::default());
        assert_eq!(config.rails(), Rails::live());
        assert_eq!(config.controls(), Controls::INACTIVE);
        assert_eq!(config.terminals(), 16);
        assert_eq!(config.format(), OutputFormat::Text);
    }

    #[test]
    fn loads_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(
            &path,
            "[rails]\ngnd = true\n\n[controls]\nrbi = false\n\n[output]\nformat = \"json\"\n",
        )
        .unwrap();
        let config = BenchConfig::load(&path).unwrap();
        assert_eq!(config.rails(), Rails::new(true, true));
        assert_eq!(config.controls(), Controls::ripple_blanking());
        assert_eq!(config.format(), OutputFormat::Json);
    }

    #[test]
    fn discovers_in_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FILE_NAME), "[rails]\nterminals = 20\n").unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let (config, path) = BenchConfig::discover_from(&nested).unwrap();
        assert_eq!(config.terminals(), 20);
        assert_eq!(path, dir.path().join(FILE_NAME));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, "[rails]\npwr = \"yes\"\n").unwrap();
        assert!(matches!(
            BenchConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(BenchConfig::discover_from(dir.path()).is_none());
        assert!(matches!(
            BenchConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
