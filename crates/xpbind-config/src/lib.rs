//! xpbind Configuration System
//!
//! Provides configuration for a plugin built on xpbind:
//! - Binding configuration (xpbind.toml next to the plugin)
//! - Environment variable overrides (XPBIND_*)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Plugin config (xpbind.toml, searched upward from the plugin directory)
//! 3. Environment variables (XPBIND_*)
//!
//! # Example
//!
//! ```no_run
//! use xpbind_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("log level: {}", config.binding.logging.level);
//! ```

pub mod binding;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

/// File name the loader searches for
pub const CONFIG_FILE_NAME: &str = "xpbind.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use binding::{BindingConfig, LibraryConfig, LogLevel, LogTarget, LoggingConfig};
pub use loader::{Config, ConfigLoader};
