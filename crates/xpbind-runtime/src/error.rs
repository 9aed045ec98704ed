//! Binding errors
//!
//! Four conditions come straight from the native boundary:
//!
//! - [`BindingError::LibraryLoadFailure`] is fatal and surfaces once, from initialization.
//! - [`BindingError::SymbolNotFound`] marks an optional or version-gated export that the
//!   loaded library does not provide. Callers decide whether they can live without it.
//! - [`BindingError::NullExport`] is raised before any call through an unresolved address.
//! - [`BindingError::InvalidCallbackState`] is never returned across the native boundary.
//!   Trampolines absorb it; it only reaches Rust callers that query a registration.

use crate::ffi::ExternType;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the binding layer
#[derive(Error, Debug)]
pub enum BindingError {
    #[error("failed to load native library '{}': {reason}", .path.display())]
    LibraryLoadFailure { path: PathBuf, reason: String },

    #[error("export '{0}' not found in the loaded native library")]
    SymbolNotFound(String),

    #[error("attempted to call unresolved export '{0}'")]
    NullExport(String),

    #[error("{kind} callback #{id} invoked outside its active window")]
    InvalidCallbackState { kind: &'static str, id: u64 },

    #[error("native library session has not been initialized")]
    NotInitialized,

    #[error("native side rejected {kind} registration")]
    RegistrationRejected { kind: &'static str },

    #[error("text argument contains an interior NUL byte at offset {0}")]
    InvalidText(usize),

    #[error("expected {expected} arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("argument type mismatch: expected {expected:?}, got {got}")]
    TypeMismatch { expected: ExternType, got: &'static str },

    #[error("unsupported native signature: {0}")]
    UnsupportedSignature(String),

    #[error(transparent)]
    Config(#[from] xpbind_config::ConfigError),
}

impl BindingError {
    /// Check whether the error means the process cannot use the binding at all
    pub fn is_fatal(&self) -> bool {
        matches!(self, BindingError::LibraryLoadFailure { .. })
    }
}

/// Result type for binding operations
pub type BindingResult<T> = Result<T, BindingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_load_failure_is_fatal() {
        let load = BindingError::LibraryLoadFailure {
            path: PathBuf::from("Resources/plugins/XPLM_64.so"),
            reason: "missing".to_string(),
        };
        assert!(load.is_fatal());
        assert!(!BindingError::SymbolNotFound("XPLMGetMyID".to_string()).is_fatal());
        assert!(!BindingError::NullExport("XPLMGetMyID".to_string()).is_fatal());
    }

    #[test]
    fn test_messages_name_the_export() {
        let err = BindingError::NullExport("XPLMDebugString".to_string());
        assert!(err.to_string().contains("XPLMDebugString"));

        let err = BindingError::InvalidCallbackState {
            kind: "flight loop",
            id: 7,
        };
        assert_eq!(
            err.to_string(),
            "flight loop callback #7 invoked outside its active window"
        );
    }
}
