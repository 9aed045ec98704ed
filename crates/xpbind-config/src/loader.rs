//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::binding::{BindingConfig, LogLevel, LogTarget};
use crate::{ConfigResult, CONFIG_FILE_NAME};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Defaults - lowest priority
/// 2. Plugin config (xpbind.toml) - overrides defaults
/// 3. Environment variables (XPBIND_*) - overrides the file
#[derive(Debug, Default)]
pub struct ConfigLoader {
    _private: (),
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Binding configuration
    pub binding: BindingConfig,

    /// File the configuration was read from, if any
    pub source: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find xpbind.toml. A plugin usually lives in
    /// `plugins/<name>/<arch>/`, so the file may sit one or two levels above the binary.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (source, binding) = self.find_binding_config(start_dir)?;
        let binding = self.apply_env_overrides(binding)?;
        binding.validate()?;

        Ok(Config { binding, source })
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let binding = BindingConfig::load_from_file(config_path)?;
        let binding = self.apply_env_overrides(binding)?;
        binding.validate()?;

        Ok(Config {
            binding,
            source: Some(config_path.to_path_buf()),
        })
    }

    /// Find the configuration file by walking up the directory tree
    fn find_binding_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, BindingConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let binding = BindingConfig::load_from_file(&config_path)?;
                return Ok((Some(config_path), binding));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, BindingConfig::default())),
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Recognized: XPBIND_LOG_LEVEL, XPBIND_LOG_TARGET, XPBIND_LOG_FILE,
    /// XPBIND_RESOURCES_ROOT.
    fn apply_env_overrides(&self, mut config: BindingConfig) -> ConfigResult<BindingConfig> {
        if let Ok(level) = env::var("XPBIND_LOG_LEVEL") {
            config.logging.level = level.parse::<LogLevel>()?;
        }

        if let Ok(target) = env::var("XPBIND_LOG_TARGET") {
            config.logging.target = target.parse::<LogTarget>()?;
        }

        if let Ok(file) = env::var("XPBIND_LOG_FILE") {
            config.logging.file = Some(PathBuf::from(file));
        }

        if let Ok(root) = env::var("XPBIND_RESOURCES_ROOT") {
            config.library.resources_root = Some(PathBuf::from(root));
        }

        Ok(config)
    }
}

impl Config {
    /// Check if the configuration came from a file
    pub fn has_file(&self) -> bool {
        self.source.is_some()
    }

    /// Directory containing the configuration file
    pub fn config_dir(&self) -> Option<&Path> {
        self.source.as_deref().and_then(Path::parent)
    }
}
