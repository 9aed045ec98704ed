//! Fixed-layout parameter blocks passed to native calls by address

use std::ffi::c_void;
use std::mem::size_of;

/// Native flight-loop callback: `float (float, float, int, void*)`
///
/// Arguments are the time since the last call, the time since the last flight
/// loop, a loop counter and the registration's `refcon`. The return value is the
/// next interval: positive seconds, negative flight loops, zero to stop.
pub type FlightLoopCallback = unsafe extern "C" fn(f32, f32, i32, *mut c_void) -> f32;

/// When a flight loop runs relative to the flight model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum FlightLoopPhase {
    #[default]
    BeforeFlightModel = 0,
    AfterFlightModel = 1,
}

/// `XPLMCreateFlightLoop_t`
///
/// The native side reads `struct_size` to tell which revision of the structure it
/// was handed; always build through [`CreateFlightLoop::new`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CreateFlightLoop {
    pub struct_size: i32,
    pub phase: FlightLoopPhase,
    pub callback: Option<FlightLoopCallback>,
    pub refcon: *mut c_void,
}

impl CreateFlightLoop {
    pub fn new(phase: FlightLoopPhase, callback: FlightLoopCallback, refcon: *mut c_void) -> Self {
        Self {
            struct_size: size_of::<Self>() as i32,
            phase,
            callback: Some(callback),
            refcon,
        }
    }
}
