//! Wrappers over the SDK's exported functions
//!
//! Each wrapper binds its exports once, from the global session or from an explicit
//! [`NativeLibrary`](crate::ffi::NativeLibrary), and exposes safe methods. An export
//! the running simulator does not provide surfaces as `NullExport` on use; wrappers
//! offer `is_available`-style checks for optional APIs.

pub mod params;
pub mod plugin_api;
pub mod processing;
pub mod utilities;

use crate::ffi::CallbackKind;
use processing::FlightLoopKind;
use utilities::CommandHandlerKind;

pub use params::{CreateFlightLoop, FlightLoopPhase};
pub use plugin_api::PluginApi;
pub use processing::{FlightLoop, FlightLoopTick, ProcessingApi};
pub use utilities::{CommandHandler, CommandPhase, UtilitiesApi};

/// Release every callback anchor of every kind
///
/// Part of plugin unload: the simulator has stopped calling this plugin's
/// trampolines, so nothing is unregistered natively.
pub fn release_all_callbacks() -> usize {
    FlightLoopKind::registry().release_all() + CommandHandlerKind::registry().release_all()
}

/// Number of anchors held across every callback kind
pub fn outstanding_callbacks() -> usize {
    FlightLoopKind::registry().outstanding() + CommandHandlerKind::registry().outstanding()
}
