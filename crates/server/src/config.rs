use anyhow::{Context, Result};
use quagmire_common::AppConfig;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/quagmire.yaml";

/// Resolved configuration with the path it came from.
pub struct LoadedConfig {
    pub config: AppConfig,
    /// `None` when no file existed at the default location and built-in
    /// defaults were used.
    pub config_path: Option<PathBuf>,
}

impl LoadedConfig {
    /// Load `path`. A missing file is only tolerated at the default
    /// location; an explicitly named file has to exist.
    pub fn load(path: &str) -> Result<Self> {
        if path == DEFAULT_CONFIG_PATH && !Path::new(path).exists() {
            let config = AppConfig::default();
            config.validate()?;
            return Ok(Self {
                config,
                config_path: None,
            });
        }

        let config =
            AppConfig::load(path).with_context(|| format!("failed to load configuration from {}", path))?;
        Ok(Self {
            config,
            config_path: Some(PathBuf::from(path)),
        })
    }

    pub fn source(&self) -> String {
        self.config_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| "built-in defaults".to_string())
    }
}
