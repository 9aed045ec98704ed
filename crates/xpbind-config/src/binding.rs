//! Binding Configuration (xpbind.toml)
//!
//! Handles plugin-level configuration stored in `xpbind.toml`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Binding configuration from xpbind.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    /// Native library loading
    #[serde(default)]
    pub library: LibraryConfig,

    /// Diagnostics output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Native library configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    /// Overrides the simulator root handed over by the host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources_root: Option<PathBuf>,

    /// Load the widgets library next to the core library
    #[serde(default = "default_true")]
    pub load_widgets: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            resources_root: None,
            load_widgets: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum level emitted
    #[serde(default)]
    pub level: LogLevel,

    /// Where log lines go
    #[serde(default)]
    pub target: LogTarget,

    /// Log file path, required when `target = "file"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Emit JSON lines instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            target: LogTarget::default(),
            file: None,
            json: false,
        }
    }
}

/// Log level names accepted in configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by tracing filters
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("unknown level '{}'", other),
            }),
        }
    }
}

/// Destination for log output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// The simulator's own log, through XPLMDebugString
    #[default]
    Host,
    Stderr,
    File,
}

impl FromStr for LogTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "host" => Ok(LogTarget::Host),
            "stderr" => Ok(LogTarget::Stderr),
            "file" => Ok(LogTarget::File),
            other => Err(ConfigError::InvalidValue {
                field: "logging.target".to_string(),
                reason: format!("unknown target '{}'", other),
            }),
        }
    }
}

fn default_true() -> bool {
    true
}

impl BindingConfig {
    /// Load binding configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the binding configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(root) = &self.library.resources_root {
            if root.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "library.resources_root".to_string(),
                    reason: "path cannot be empty".to_string(),
                });
            }
        }

        if self.logging.target == LogTarget::File {
            match &self.logging.file {
                None => {
                    return Err(ConfigError::ValidationError(
                        "logging.target = \"file\" requires logging.file".to_string(),
                    ))
                }
                Some(file) if file.as_os_str().is_empty() => {
                    return Err(ConfigError::InvalidValue {
                        field: "logging.file".to_string(),
                        reason: "path cannot be empty".to_string(),
                    })
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Resources root to use, preferring the configured override
    pub fn resources_root<'a>(&'a self, host_root: &'a Path) -> &'a Path {
        self.library.resources_root.as_deref().unwrap_or(host_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: BindingConfig = toml::from_str("").unwrap();
        assert_eq!(config, BindingConfig::default());
        assert!(config.library.load_widgets);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.target, LogTarget::Host);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[library]
resources_root = "/opt/X-Plane 12"
load_widgets = false

[logging]
level = "debug"
target = "file"
file = "xpbind.log"
json = true
"#;

        let config: BindingConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.library.resources_root.as_deref(),
            Some(Path::new("/opt/X-Plane 12"))
        );
        assert!(!config.library.load_widgets);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.json);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
[library]
path = "nope"
"#;
        assert!(toml::from_str::<BindingConfig>(toml).is_err());
    }

    #[test]
    fn test_file_target_requires_path() {
        let mut config = BindingConfig::default();
        config.logging.target = LogTarget::File;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" trace ".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_resources_root_override() {
        let host = Path::new("/host/root");
        let mut config = BindingConfig::default();
        assert_eq!(config.resources_root(host), host);

        config.library.resources_root = Some(PathBuf::from("/custom"));
        assert_eq!(config.resources_root(host), Path::new("/custom"));
    }
}
