use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Where page info for a citation group is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadModel {
    /// One page info per group, attributed to the last citation
    Group,
    /// One page info per citation
    #[default]
    Citation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub payload_model: PayloadModel,
    /// Number citations inside footnotes as if they stood at the footnote mark
    pub map_footnotes_to_marks: bool,
    /// Maximum number of overlap incidents reported at once (0 = unlimited)
    pub overlap_report_cap: usize,
    /// Report markers that touch without a separating character
    pub require_separation: bool,
    /// Use `<` and `>` instead of zero-width spaces while filling markers
    pub visible_placeholders: bool,
    pub rebuild_bibliography: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            payload_model: PayloadModel::default(),
            map_footnotes_to_marks: true,
            overlap_report_cap: 10,
            require_separation: false,
            visible_placeholders: false,
            rebuild_bibliography: true,
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        Ok(Some(config))
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Where the user's config file lives; callers pass it to
    /// [`Config::load_from_path`] and [`Config::save_to_path`]
    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/refmark");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }
}
