//! Timing and flight loops (`XPLMProcessing`)
//!
//! A [`FlightLoop`] owns one native flight-loop registration. Its handler runs once
//! per scheduled simulator frame through a static trampoline, so the per-call path
//! is a registry lookup and a closure call with no allocation.

use crate::error::BindingResult;
use crate::ffi::callbacks::{CallbackKind, CallbackRegistry, CallbackState, RegistrationId};
use crate::ffi::{check_registration, NativeFn, NativeLibrary};
use crate::handle::FlightLoopId;
use crate::session;
use crate::xplm::params::{CreateFlightLoop, FlightLoopCallback, FlightLoopPhase};
use std::ffi::c_void;
use std::sync::OnceLock;

type GetElapsedTimeFn = unsafe extern "C" fn() -> f32;
type GetCycleNumberFn = unsafe extern "C" fn() -> i32;
type CreateFlightLoopFn = unsafe extern "C" fn(*const CreateFlightLoop) -> FlightLoopId;
type DestroyFlightLoopFn = unsafe extern "C" fn(FlightLoopId);
type ScheduleFlightLoopFn = unsafe extern "C" fn(FlightLoopId, f32, i32);

/// Processing exports, bound once
#[derive(Debug)]
pub struct ProcessingApi {
    get_elapsed_time: NativeFn<GetElapsedTimeFn>,
    get_cycle_number: NativeFn<GetCycleNumberFn>,
    create_flight_loop: NativeFn<CreateFlightLoopFn>,
    destroy_flight_loop: NativeFn<DestroyFlightLoopFn>,
    schedule_flight_loop: NativeFn<ScheduleFlightLoopFn>,
}

static API: OnceLock<ProcessingApi> = OnceLock::new();

impl ProcessingApi {
    pub fn bind(library: &NativeLibrary) -> Self {
        // Signatures follow XPLMProcessing.h.
        unsafe {
            Self {
                get_elapsed_time: NativeFn::bind(library, "XPLMGetElapsedTime"),
                get_cycle_number: NativeFn::bind(library, "XPLMGetCycleNumber"),
                create_flight_loop: NativeFn::bind(library, "XPLMCreateFlightLoop"),
                destroy_flight_loop: NativeFn::bind(library, "XPLMDestroyFlightLoop"),
                schedule_flight_loop: NativeFn::bind(library, "XPLMScheduleFlightLoop"),
            }
        }
    }

    /// Bound against the global session
    pub fn global() -> BindingResult<&'static Self> {
        if let Some(api) = API.get() {
            return Ok(api);
        }
        let session = session::get()?;
        Ok(API.get_or_init(|| Self::bind(session.xplm())))
    }

    /// Seconds since the simulator started
    pub fn elapsed_time(&self) -> BindingResult<f32> {
        unsafe { self.get_elapsed_time.call(()) }
    }

    /// Number of simulator cycles since startup
    pub fn cycle_number(&self) -> BindingResult<i32> {
        unsafe { self.get_cycle_number.call(()) }
    }

    /// Check whether the flight-loop API (SDK 2.1+) is present
    pub fn has_flight_loops(&self) -> bool {
        self.create_flight_loop.is_available()
            && self.destroy_flight_loop.is_available()
            && self.schedule_flight_loop.is_available()
    }

    /// Register a flight loop running `handler`
    ///
    /// The loop starts unscheduled; call [`FlightLoop::schedule`] to run it.
    pub fn create_flight_loop<H>(&'static self, phase: FlightLoopPhase, handler: H) -> BindingResult<FlightLoop>
    where
        H: FnMut(FlightLoopTick) -> f32 + Send + 'static,
    {
        let pending = FlightLoopKind::registry().begin(Box::new(handler));
        let params = CreateFlightLoop::new(
            phase,
            flight_loop_trampoline as FlightLoopCallback,
            pending.refcon(),
        );

        // An error here drops `pending`, which rolls the anchor back.
        let raw = unsafe { self.create_flight_loop.call((&params as *const CreateFlightLoop,)) }?;
        let id = FlightLoopId::from_raw(check_registration(FlightLoopKind::NAME, raw.into_raw())?);
        let registration = pending.activate();

        tracing::debug!(flight_loop = ?id, registration = registration.get(), ?phase, "flight loop created");
        Ok(FlightLoop {
            id,
            registration,
            api: self,
        })
    }
}

/// Arguments of one flight-loop invocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightLoopTick {
    pub since_last_call: f32,
    pub since_last_flight_loop: f32,
    pub counter: i32,
}

/// Callback family for `XPLMCreateFlightLoop`
pub struct FlightLoopKind;

impl CallbackKind for FlightLoopKind {
    type Handler = dyn FnMut(FlightLoopTick) -> f32 + Send;
    const NAME: &'static str = "flight loop";

    fn registry() -> &'static CallbackRegistry<Self> {
        static REGISTRY: CallbackRegistry<FlightLoopKind> = CallbackRegistry::new();
        &REGISTRY
    }
}

// A dropped invocation returns 0, which tells the simulator to stop scheduling.
extern "C" fn flight_loop_trampoline(
    since_last_call: f32,
    since_last_flight_loop: f32,
    counter: i32,
    refcon: *mut c_void,
) -> f32 {
    let tick = FlightLoopTick {
        since_last_call,
        since_last_flight_loop,
        counter,
    };
    FlightLoopKind::registry().dispatch(refcon, 0.0, |handler| handler(tick))
}

/// A registered flight loop; destroyed when dropped
#[derive(Debug)]
pub struct FlightLoop {
    id: FlightLoopId,
    registration: RegistrationId,
    api: &'static ProcessingApi,
}

impl FlightLoop {
    /// Create a flight loop through the global session
    pub fn create<H>(phase: FlightLoopPhase, handler: H) -> BindingResult<Self>
    where
        H: FnMut(FlightLoopTick) -> f32 + Send + 'static,
    {
        ProcessingApi::global()?.create_flight_loop(phase, handler)
    }

    pub fn id(&self) -> FlightLoopId {
        self.id
    }

    pub fn registration(&self) -> RegistrationId {
        self.registration
    }

    /// Schedule the next run: positive `interval` in seconds, negative in flight
    /// loops, zero to pause
    pub fn schedule(&self, interval: f32, relative_to_now: bool) -> BindingResult<()> {
        FlightLoopKind::registry().ensure_active(self.registration)?;
        unsafe {
            self.api
                .schedule_flight_loop
                .call((self.id, interval, i32::from(relative_to_now)))
        }
    }

    /// Destroy the native flight loop and release its handler, consuming the guard
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for FlightLoop {
    fn drop(&mut self) {
        let registry = FlightLoopKind::registry();

        // After a mass release at plugin stop the native side is already done with it.
        if registry.state(self.registration) != CallbackState::Unregistered {
            if let Err(error) = unsafe { self.api.destroy_flight_loop.call((self.id,)) } {
                tracing::warn!(%error, "flight loop could not be destroyed natively");
            }
            registry.unregister(self.registration);
            tracing::debug!(flight_loop = ?self.id, "flight loop destroyed");
        }
    }
}

/// Seconds since the simulator started, through the global session
pub fn elapsed_time() -> BindingResult<f32> {
    ProcessingApi::global()?.elapsed_time()
}

/// Simulator cycle count, through the global session
pub fn cycle_number() -> BindingResult<i32> {
    ProcessingApi::global()?.cycle_number()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindingError;
    use crate::ffi::ExportAddr;
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn unbound_api() -> &'static ProcessingApi {
        Box::leak(Box::new(ProcessingApi::bind_none()))
    }

    unsafe extern "C" fn rejecting_create(_: *const CreateFlightLoop) -> FlightLoopId {
        FlightLoopId::from_raw(std::ptr::null_mut())
    }

    #[test]
    fn test_unresolved_exports_are_null_exports() {
        let api = unbound_api();
        assert!(!api.has_flight_loops());
        assert!(matches!(api.elapsed_time(), Err(BindingError::NullExport(_))));
        assert!(matches!(api.cycle_number(), Err(BindingError::NullExport(_))));
    }

    #[test]
    #[serial]
    fn test_failed_creation_releases_anchor() {
        let before = FlightLoopKind::registry().outstanding();

        let result = unbound_api().create_flight_loop(FlightLoopPhase::BeforeFlightModel, |_| 1.0);
        assert!(matches!(result, Err(BindingError::NullExport(_))));

        let api: &'static ProcessingApi = Box::leak(Box::new(ProcessingApi {
            create_flight_loop: unsafe {
                NativeFn::from_addr(
                    "XPLMCreateFlightLoop",
                    ExportAddr::from_ptr(rejecting_create as *const c_void),
                )
            },
            ..ProcessingApi::bind_none()
        }));
        let result = api.create_flight_loop(FlightLoopPhase::AfterFlightModel, |_| 1.0);
        assert!(matches!(
            result,
            Err(BindingError::RegistrationRejected { kind: "flight loop" })
        ));

        assert_eq!(FlightLoopKind::registry().outstanding(), before);
    }

    static DESTROYED: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn accepting_create(_: *const CreateFlightLoop) -> FlightLoopId {
        FlightLoopId::from_raw(0x40 as *mut c_void)
    }

    unsafe extern "C" fn counting_destroy(_: FlightLoopId) {
        DESTROYED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    #[serial]
    fn test_destroy_releases_native_loop_once() {
        let before = FlightLoopKind::registry().outstanding();
        let api: &'static ProcessingApi = Box::leak(Box::new(ProcessingApi {
            create_flight_loop: unsafe {
                NativeFn::from_addr(
                    "XPLMCreateFlightLoop",
                    ExportAddr::from_ptr(accepting_create as *const c_void),
                )
            },
            destroy_flight_loop: unsafe {
                NativeFn::from_addr(
                    "XPLMDestroyFlightLoop",
                    ExportAddr::from_ptr(counting_destroy as *const c_void),
                )
            },
            ..ProcessingApi::bind_none()
        }));

        let flight_loop = api
            .create_flight_loop(FlightLoopPhase::BeforeFlightModel, |_| -1.0)
            .unwrap();
        let registration = flight_loop.registration();
        assert_eq!(FlightLoopKind::registry().state(registration), CallbackState::Active);

        let destroyed = DESTROYED.load(Ordering::SeqCst);
        flight_loop.destroy();

        assert_eq!(DESTROYED.load(Ordering::SeqCst), destroyed + 1);
        assert_eq!(FlightLoopKind::registry().state(registration), CallbackState::Unregistered);
        assert_eq!(FlightLoopKind::registry().outstanding(), before);
    }

    #[test]
    fn test_trampoline_with_stale_refcon_stops_loop() {
        let stale = 0xdead_beef_usize as *mut c_void;
        assert_eq!(flight_loop_trampoline(0.1, 0.1, 1, stale), 0.0);
    }

    impl ProcessingApi {
        fn bind_none() -> Self {
            Self {
                get_elapsed_time: NativeFn::unresolved("XPLMGetElapsedTime"),
                get_cycle_number: NativeFn::unresolved("XPLMGetCycleNumber"),
                create_flight_loop: NativeFn::unresolved("XPLMCreateFlightLoop"),
                destroy_flight_loop: NativeFn::unresolved("XPLMDestroyFlightLoop"),
                schedule_flight_loop: NativeFn::unresolved("XPLMScheduleFlightLoop"),
            }
        }
    }
}
