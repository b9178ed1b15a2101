// src/config/loader.rs
//! Layered configuration loading
//!
//! Sources are merged in order: built-in defaults, each TOML file that exists,
//! then `EMG_DECOMP__SECTION__KEY` environment variables. The merged result is
//! validated before it is handed out.

use super::DecompositionConfig;
use crate::error::{DecompResult, DecompositionError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default environment prefix
pub const ENV_PREFIX: &str = "EMG_DECOMP";

/// Configuration loader over files and environment variables
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader over the standard search paths and the default env prefix
    pub fn new() -> Self {
        Self {
            config_paths: Self::discover_config_paths(),
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    /// Loader over explicit paths only, with environment overrides disabled
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            env_prefix: None,
        }
    }

    pub fn add_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_paths.push(path.into());
        self
    }

    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    /// Merge all sources and validate the result
    pub fn load(&self) -> DecompResult<DecompositionConfig> {
        let mut builder = config::Config::builder();

        for path in &self.config_paths {
            if path.exists() {
                debug!(path = %path.display(), "adding configuration file");
            }
            builder = builder.add_source(config::File::from(path.as_path()).required(false));
        }

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                config::Environment::with_prefix(prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: DecompositionConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            files = self.config_paths.len(),
            contrast = ?config.separation.contrast,
            windows = config.segmentation.window_count,
            "decomposition configuration loaded"
        );
        Ok(config)
    }

    /// Load a single TOML file, failing if it is absent
    pub fn load_file<P: AsRef<Path>>(path: P) -> DecompResult<DecompositionConfig> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DecompositionError::configuration(
                "loader",
                format!("configuration file not found: {}", path.display()),
            ));
        }
        Self::with_paths(vec![path.to_path_buf()]).load()
    }

    /// Write a configuration out as pretty TOML
    pub fn export<P: AsRef<Path>>(config: &DecompositionConfig, path: P) -> DecompResult<()> {
        let content = toml::to_string_pretty(config)
            .map_err(|e| DecompositionError::configuration("loader", e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("emg-decomp.toml")];
        if let Ok(dir) = std::env::var("EMG_DECOMP_CONFIG_DIR") {
            paths.push(PathBuf::from(dir).join("emg-decomp.toml"));
        }
        paths
    }
}
