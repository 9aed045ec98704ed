//! Stand-in for the simulator's `XPLM` library
//!
//! Exports `Example` plus a subset of the real SDK with enough behavior to drive
//! the binding end to end: commands with handlers, flight loops with scheduling,
//! the debug log and feature flags. The `Sim*` exports play the simulator's part,
//! calling back into registered callbacks the way the frame loop would.
//!
//! Callbacks are always invoked with the stub's own lock released, so a callback
//! may call back into the stub.

#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

use std::ffi::{c_char, c_void, CStr};
use std::sync::{Mutex, MutexGuard, PoisonError};

type FlightLoopCallback = unsafe extern "C" fn(f32, f32, i32, *mut c_void) -> f32;
type CommandCallback = unsafe extern "C" fn(*mut c_void, i32, *mut c_void) -> i32;

const NO_PLUGIN_ID: i32 = -1;
const STUB_PLUGIN_ID: i32 = 7;
const STUB_SIGNATURE: &str = "org.xpbind.stub";
const SECONDS_PER_CYCLE: f32 = 0.05;

const PHASE_BEGIN: i32 = 0;
const PHASE_END: i32 = 2;

#[repr(C)]
pub struct CreateFlightLoop {
    struct_size: i32,
    phase: i32,
    callback: Option<FlightLoopCallback>,
    refcon: *mut c_void,
}

#[derive(Clone, Copy)]
struct FlightLoopEntry {
    id: usize,
    callback: FlightLoopCallback,
    refcon: usize,
    interval: f32,
    counter: i32,
    last_run: f32,
}

#[derive(Clone, Copy)]
struct HandlerEntry {
    command: usize,
    callback: CommandCallback,
    before: bool,
    refcon: usize,
}

struct Command {
    name: String,
    executions: i32,
}

struct Sim {
    cycle: i32,
    next_loop_id: usize,
    flight_loops: Vec<FlightLoopEntry>,
    destroyed_loops: Vec<FlightLoopEntry>,
    commands: Vec<Command>,
    handlers: Vec<HandlerEntry>,
    removed_handlers: Vec<HandlerEntry>,
    log: Vec<String>,
    features: Vec<(&'static str, bool)>,
}

impl Sim {
    const fn new() -> Self {
        Self {
            cycle: 0,
            next_loop_id: 1,
            flight_loops: Vec::new(),
            destroyed_loops: Vec::new(),
            commands: Vec::new(),
            handlers: Vec::new(),
            removed_handlers: Vec::new(),
            log: Vec::new(),
            features: Vec::new(),
        }
    }

    fn reset(&mut self) {
        *self = Sim::new();
        self.commands.push(Command {
            name: "sim/operation/pause_toggle".to_string(),
            executions: 0,
        });
        self.features = vec![
            ("XPLM_USE_NATIVE_PATHS", false),
            ("XPLM_USE_NATIVE_WIDGET_WINDOWS", false),
        ];
    }

    fn elapsed(&self) -> f32 {
        self.cycle as f32 * SECONDS_PER_CYCLE
    }

    fn find_command(&self, name: &str) -> Option<usize> {
        self.commands.iter().position(|c| c.name == name).map(|i| i + 1)
    }
}

// Raw pointers are stored as integers so the state can live in a static.
static SIM: Mutex<Sim> = Mutex::new(Sim::new());

fn sim() -> MutexGuard<'static, Sim> {
    let mut guard = SIM.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.commands.is_empty() {
        guard.reset();
    }
    guard
}

unsafe fn text(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

// ============================================================================
// Smoke export
// ============================================================================

#[no_mangle]
pub extern "C" fn Example(a: i32, b: i32) -> i32 {
    a + b
}

// ============================================================================
// XPLMPlugin
// ============================================================================

#[no_mangle]
pub extern "C" fn XPLMGetMyID() -> i32 {
    STUB_PLUGIN_ID
}

#[no_mangle]
pub extern "C" fn XPLMCountPlugins() -> i32 {
    1
}

#[no_mangle]
pub unsafe extern "C" fn XPLMFindPluginBySignature(signature: *const c_char) -> i32 {
    if text(signature) == STUB_SIGNATURE {
        STUB_PLUGIN_ID
    } else {
        NO_PLUGIN_ID
    }
}

#[no_mangle]
pub unsafe extern "C" fn XPLMHasFeature(feature: *const c_char) -> i32 {
    let name = text(feature);
    i32::from(sim().features.iter().any(|(f, _)| *f == name))
}

#[no_mangle]
pub unsafe extern "C" fn XPLMIsFeatureEnabled(feature: *const c_char) -> i32 {
    let name = text(feature);
    i32::from(sim().features.iter().any(|(f, on)| *f == name && *on))
}

#[no_mangle]
pub unsafe extern "C" fn XPLMEnableFeature(feature: *const c_char, enable: i32) {
    let name = text(feature);
    if let Some(entry) = sim().features.iter_mut().find(|(f, _)| *f == name) {
        entry.1 = enable != 0;
    }
}

// ============================================================================
// XPLMUtilities
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn XPLMDebugString(message: *const c_char) {
    let line = text(message);
    sim().log.push(line);
}

#[no_mangle]
pub unsafe extern "C" fn XPLMFindCommand(name: *const c_char) -> *mut c_void {
    let name = text(name);
    sim().find_command(&name).unwrap_or(0) as *mut c_void
}

#[no_mangle]
pub unsafe extern "C" fn XPLMCreateCommand(name: *const c_char, _description: *const c_char) -> *mut c_void {
    let name = text(name);
    let mut sim = sim();
    let id = match sim.find_command(&name) {
        Some(id) => id,
        None => {
            sim.commands.push(Command { name, executions: 0 });
            sim.commands.len()
        }
    };
    id as *mut c_void
}

#[no_mangle]
pub extern "C" fn XPLMCommandOnce(command: *mut c_void) {
    run_command(command as usize, PHASE_BEGIN);
    run_command(command as usize, PHASE_END);
}

#[no_mangle]
pub extern "C" fn XPLMCommandBegin(command: *mut c_void) {
    run_command(command as usize, PHASE_BEGIN);
}

#[no_mangle]
pub extern "C" fn XPLMCommandEnd(command: *mut c_void) {
    run_command(command as usize, PHASE_END);
}

#[no_mangle]
pub extern "C" fn XPLMRegisterCommandHandler(
    command: *mut c_void,
    callback: Option<CommandCallback>,
    before: i32,
    refcon: *mut c_void,
) {
    if let Some(callback) = callback {
        sim().handlers.push(HandlerEntry {
            command: command as usize,
            callback,
            before: before != 0,
            refcon: refcon as usize,
        });
    }
}

#[no_mangle]
pub extern "C" fn XPLMUnregisterCommandHandler(
    command: *mut c_void,
    callback: Option<CommandCallback>,
    before: i32,
    refcon: *mut c_void,
) {
    let Some(callback) = callback else { return };
    let mut sim = sim();
    let matches = |h: &HandlerEntry| {
        h.command == command as usize
            && h.callback as usize == callback as usize
            && h.before == (before != 0)
            && h.refcon == refcon as usize
    };
    if let Some(pos) = sim.handlers.iter().position(matches) {
        let removed = sim.handlers.remove(pos);
        sim.removed_handlers.push(removed);
    }
}

// Before-handlers, then the simulator's own handling, then after-handlers; any
// handler returning 0 stops the chain.
fn run_command(command: usize, phase: i32) {
    let (before, after): (Vec<_>, Vec<_>) = {
        let sim = sim();
        if command == 0 || command > sim.commands.len() {
            return;
        }
        sim.handlers
            .iter()
            .filter(|h| h.command == command)
            .copied()
            .partition(|h| h.before)
    };

    let invoke = |h: &HandlerEntry| unsafe {
        (h.callback)(command as *mut c_void, phase, h.refcon as *mut c_void) != 0
    };

    if !before.iter().all(invoke) {
        return;
    }
    if phase == PHASE_BEGIN {
        sim().commands[command - 1].executions += 1;
    }
    for handler in &after {
        if !invoke(handler) {
            break;
        }
    }
}

// ============================================================================
// XPLMProcessing
// ============================================================================

#[no_mangle]
pub extern "C" fn XPLMGetElapsedTime() -> f32 {
    sim().elapsed()
}

#[no_mangle]
pub extern "C" fn XPLMGetCycleNumber() -> i32 {
    sim().cycle
}

#[no_mangle]
pub unsafe extern "C" fn XPLMCreateFlightLoop(params: *const CreateFlightLoop) -> *mut c_void {
    if params.is_null() {
        return std::ptr::null_mut();
    }
    let params = &*params;
    if (params.struct_size as usize) < std::mem::size_of::<CreateFlightLoop>() {
        return std::ptr::null_mut();
    }
    let Some(callback) = params.callback else {
        return std::ptr::null_mut();
    };

    let mut sim = sim();
    let id = sim.next_loop_id;
    sim.next_loop_id += 1;
    let now = sim.elapsed();
    sim.flight_loops.push(FlightLoopEntry {
        id,
        callback,
        refcon: params.refcon as usize,
        interval: 0.0,
        counter: 0,
        last_run: now,
    });
    id as *mut c_void
}

#[no_mangle]
pub extern "C" fn XPLMDestroyFlightLoop(id: *mut c_void) {
    let mut sim = sim();
    if let Some(pos) = sim.flight_loops.iter().position(|l| l.id == id as usize) {
        let removed = sim.flight_loops.remove(pos);
        sim.destroyed_loops.push(removed);
    }
}

#[no_mangle]
pub extern "C" fn XPLMScheduleFlightLoop(id: *mut c_void, interval: f32, _relative_to_now: i32) {
    if let Some(entry) = sim().flight_loops.iter_mut().find(|l| l.id == id as usize) {
        entry.interval = interval;
    }
}

// ============================================================================
// Simulator hooks
// ============================================================================

/// Clear all state back to a fresh simulator
#[no_mangle]
pub extern "C" fn SimReset() {
    sim().reset();
}

/// Advance one frame and run every scheduled flight loop; returns how many ran
#[no_mangle]
pub extern "C" fn SimRunFlightLoops() -> i32 {
    let (due, now) = {
        let mut sim = sim();
        sim.cycle += 1;
        let now = sim.elapsed();
        let due: Vec<FlightLoopEntry> = sim
            .flight_loops
            .iter()
            .filter(|l| l.interval != 0.0)
            .copied()
            .collect();
        (due, now)
    };

    for entry in &due {
        let next = unsafe {
            (entry.callback)(
                now - entry.last_run,
                SECONDS_PER_CYCLE,
                entry.counter + 1,
                entry.refcon as *mut c_void,
            )
        };

        // The callback may have destroyed its own loop.
        if let Some(live) = sim().flight_loops.iter_mut().find(|l| l.id == entry.id) {
            live.interval = next;
            live.counter += 1;
            live.last_run = now;
        }
    }
    due.len() as i32
}

/// Call every destroyed flight loop's callback as a misbehaving simulator would
#[no_mangle]
pub extern "C" fn SimInvokeDestroyedFlightLoops() -> i32 {
    let destroyed = sim().destroyed_loops.clone();
    for entry in &destroyed {
        unsafe { (entry.callback)(0.0, 0.0, 0, entry.refcon as *mut c_void) };
    }
    destroyed.len() as i32
}

/// Call every removed command handler as a misbehaving simulator would
#[no_mangle]
pub extern "C" fn SimInvokeRemovedCommandHandlers() -> i32 {
    let removed = sim().removed_handlers.clone();
    for entry in &removed {
        unsafe {
            (entry.callback)(entry.command as *mut c_void, PHASE_BEGIN, entry.refcon as *mut c_void)
        };
    }
    removed.len() as i32
}

#[no_mangle]
pub extern "C" fn SimFlightLoopCount() -> i32 {
    sim().flight_loops.len() as i32
}

#[no_mangle]
pub extern "C" fn SimCommandHandlerCount() -> i32 {
    sim().handlers.len() as i32
}

/// Times the simulator's own handling of `command` ran
#[no_mangle]
pub extern "C" fn SimCommandExecutions(command: *mut c_void) -> i32 {
    let sim = sim();
    match command as usize {
        0 => 0,
        n => sim.commands.get(n - 1).map_or(0, |c| c.executions),
    }
}

#[no_mangle]
pub extern "C" fn SimLogLineCount() -> i32 {
    sim().log.len() as i32
}

/// 1 if any logged line contains `needle`
#[no_mangle]
pub unsafe extern "C" fn SimLogContains(needle: *const c_char) -> i32 {
    let needle = text(needle);
    i32::from(sim().log.iter().any(|line| line.contains(&needle)))
}
