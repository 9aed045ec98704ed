//! Foreign Function Interface (FFI) infrastructure
//!
//! The three primitives every SDK wrapper is built from:
//! - Symbol resolution: loading the simulator's libraries and memoizing exports
//!   (`loader`)
//! - Typed invocation: calling a resolved export with an exact signature
//!   (`caller`, with argument marshaling in `marshal` and `types`)
//! - Callback registration: native-callable trampolines with anchored handlers
//!   (`callbacks`)
//!
//! # Safety
//!
//! All unsafe code lives in this module. Wrappers above it state their native
//! signatures once, at bind time, and call through safe methods afterwards.

pub mod callbacks;
pub mod caller;
pub mod loader;
pub mod marshal;
pub mod safety;
pub mod types;

pub use callbacks::{
    CallbackKind, CallbackRegistry, CallbackState, PendingRegistration, RegistrationId,
};
pub use caller::{CallingConvention, ExternFunction, NativeFn, Signature};
pub use loader::{library_path, ExportAddr, LibraryKind, NativeLibrary};
pub use marshal::{read_c_string, MarshalContext, NativeArg, ShortText, StackCStr};
pub use safety::{absorb_panic, check_export, check_registration};
pub use types::{CType, ExternType, NativeType};
