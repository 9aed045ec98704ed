//! Safe wrappers for common FFI patterns
//!
//! Null checks on the way out to native code and panic containment on the way in.

use crate::error::{BindingError, BindingResult};
use crate::ffi::loader::ExportAddr;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Check an export address before calling through it
#[inline]
pub fn check_export(name: &str, addr: ExportAddr) -> BindingResult<ExportAddr> {
    if addr.is_resolved() {
        Ok(addr)
    } else {
        Err(BindingError::NullExport(name.to_string()))
    }
}

/// Check an id returned by a native registering call
///
/// The SDK reports a refused registration with a null id.
pub fn check_registration<T>(kind: &'static str, id: *mut T) -> BindingResult<*mut T> {
    if id.is_null() {
        Err(BindingError::RegistrationRejected { kind })
    } else {
        Ok(id)
    }
}

/// Run application code that must not unwind into native frames
///
/// A panic is logged and replaced by `fallback`.
pub fn absorb_panic<R>(context: &'static str, fallback: R, f: impl FnOnce() -> R) -> R {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            tracing::error!(
                context,
                panic = panic_message(payload.as_ref()),
                "panic absorbed at native boundary"
            );
            fallback
        }
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
