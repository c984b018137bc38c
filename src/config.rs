use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{
    DEFAULT_CONVERTER, DEFAULT_EXCLUDED_DIR_NAME, DEFAULT_NOTIFY_LEVEL, DEFAULT_TEXTURE_FORMAT,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub source_root: PathBuf,
    pub output_root: Option<PathBuf>,
    pub repackage_root: Option<PathBuf>,
    pub converter_executable_path: PathBuf,
    pub excluded_dir_names: Vec<String>,
    pub texture_format: String,
    pub notify_level: String,
}

impl Config {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: None,
            repackage_root: None,
            converter_executable_path: PathBuf::from(DEFAULT_CONVERTER),
            excluded_dir_names: vec![DEFAULT_EXCLUDED_DIR_NAME.to_string()],
            texture_format: DEFAULT_TEXTURE_FORMAT.to_string(),
            notify_level: DEFAULT_NOTIFY_LEVEL.to_string(),
        }
    }

    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = Some(output_root.into());
        self
    }

    pub fn with_repackage_root(mut self, repackage_root: impl Into<PathBuf>) -> Self {
        self.repackage_root = Some(repackage_root.into());
        self
    }

    pub fn output_root(&self) -> Result<&Path, ConfigError> {
        self.output_root
            .as_deref()
            .ok_or(ConfigError::Missing("output_root"))
    }

    pub fn repackage_root(&self) -> Result<&Path, ConfigError> {
        self.repackage_root
            .as_deref()
            .ok_or(ConfigError::Missing("repackage_root"))
    }
}

// Later layers win on merge.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub source_root: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub repackage_root: Option<PathBuf>,
    pub converter_executable_path: Option<PathBuf>,
    pub excluded_dir_names: Option<Vec<String>>,
    pub texture_format: Option<String>,
    pub notify_level: Option<String>,
}

impl ConfigLayer {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn merge(self, overrides: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            source_root: overrides.source_root.or(self.source_root),
            output_root: overrides.output_root.or(self.output_root),
            repackage_root: overrides.repackage_root.or(self.repackage_root),
            converter_executable_path: overrides
                .converter_executable_path
                .or(self.converter_executable_path),
            excluded_dir_names: overrides.excluded_dir_names.or(self.excluded_dir_names),
            texture_format: overrides.texture_format.or(self.texture_format),
            notify_level: overrides.notify_level.or(self.notify_level),
        }
    }

    pub fn resolve(self) -> Result<Config, ConfigError> {
        let source_root = self
            .source_root
            .ok_or(ConfigError::Missing("source_root"))?;
        let mut config = Config::new(source_root);

        config.output_root = self.output_root;
        config.repackage_root = self.repackage_root;
        if let Some(converter) = self.converter_executable_path {
            config.converter_executable_path = converter;
        }
        if let Some(excluded) = self.excluded_dir_names {
            config.excluded_dir_names = excluded;
        }
        if let Some(texture_format) = self.texture_format {
            config.texture_format = texture_format;
        }
        if let Some(notify_level) = self.notify_level {
            config.notify_level = notify_level;
        }

        Ok(config)
    }
}
