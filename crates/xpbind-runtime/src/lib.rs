//! xpbind runtime - native binding layer for the X-Plane plugin SDK
//!
//! This library provides the substrate every SDK wrapper is built on:
//! - Loading the simulator's libraries and resolving exports once
//! - Calling exports through typed, null-checked function pointers
//! - Native-callable trampolines with anchored handler lifetimes
//! - Nominal handle types for every native identifier
//!
//! plus the plugin-side plumbing around them: configuration-driven logging into the
//! simulator log, a process-wide session, and a lifecycle driver that releases all
//! callbacks on unload.

/// xpbind runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod ffi;
pub mod handle;
pub mod logging;
pub mod plugin;
pub mod session;
pub mod xplm;

pub use error::{BindingError, BindingResult};
pub use ffi::{
    CallbackKind, CallbackRegistry, CallbackState, ExportAddr, LibraryKind, NativeFn,
    NativeLibrary, RegistrationId,
};
pub use handle::{
    CommandRef, DataRef, FlightLoopId, HotKeyId, InstanceRef, MapLayerId, MenuId, NavRef,
    PluginId, ProbeRef, WindowId,
};
pub use plugin::{LifecycleState, Plugin, PluginLifecycle};
pub use session::Session;

use std::path::Path;
use xpbind_config::ConfigLoader;

/// Load configuration, start logging and initialize the native session
///
/// `plugin_dir` is where the search for `xpbind.toml` starts; `host_root` is the
/// simulator root reported by the host.
pub fn initialize(plugin_dir: &Path, host_root: &Path) -> BindingResult<&'static Session> {
    let config = ConfigLoader::new().load_from_directory(plugin_dir)?;
    logging::init(&config.binding.logging)?;

    if let Some(source) = &config.source {
        tracing::debug!(config = %source.display(), "configuration loaded");
    }
    session::init(host_root, &config.binding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke() {
        assert_eq!(VERSION, "0.1.0");
    }
}
