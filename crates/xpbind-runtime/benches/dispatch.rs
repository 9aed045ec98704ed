//! Native call and callback dispatch benchmarks
//!
//! Measures the per-call overhead the binding adds on the hot paths:
//! - Typed direct calls through `NativeFn`
//! - Run-time described calls through `ExternFunction`
//! - Native-to-handler delivery through a callback registry

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::ffi::c_void;
use xpbind_runtime::ffi::{
    CallbackKind, CallbackRegistry, ExportAddr, ExternFunction, ExternType, NativeArg, NativeFn,
    ShortText,
};

type AddFn = unsafe extern "C" fn(i32, i32) -> i32;

extern "C" fn add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

extern "C" fn text_len(text: *const std::ffi::c_char) -> i32 {
    unsafe { std::ffi::CStr::from_ptr(text) }.to_bytes().len() as i32
}

fn addr_of(f: *const c_void) -> ExportAddr {
    ExportAddr::from_ptr(f)
}

// ============================================================================
// Outbound calls
// ============================================================================

fn bench_native_fn(c: &mut Criterion) {
    let add_fn: NativeFn<AddFn> = unsafe { NativeFn::from_addr("add", addr_of(add as *const c_void)) };

    c.bench_function("native_fn_call", |b| {
        b.iter(|| unsafe { add_fn.call((black_box(3), black_box(4))) })
    });
}

fn bench_extern_function(c: &mut Criterion) {
    let add_fn = unsafe {
        ExternFunction::new(
            "add",
            addr_of(add as *const c_void),
            vec![ExternType::CInt, ExternType::CInt],
            ExternType::CInt,
        )
    };
    let len_fn = unsafe {
        ExternFunction::new(
            "text_len",
            addr_of(text_len as *const c_void),
            vec![ExternType::CCharPtr],
            ExternType::CInt,
        )
    };

    c.bench_function("extern_function_call_int", |b| {
        b.iter(|| unsafe { add_fn.call(&[NativeArg::from(black_box(3)), NativeArg::from(4)]) })
    });
    c.bench_function("extern_function_call_text", |b| {
        b.iter(|| unsafe { len_fn.call(&[NativeArg::from(black_box("sim/operation/pause_toggle"))]) })
    });
}

fn bench_short_text(c: &mut Criterion) {
    let long = "x".repeat(1024);

    c.bench_function("short_text_inline", |b| {
        b.iter(|| ShortText::new(black_box("sim/flightmodel/position/latitude")))
    });
    c.bench_function("short_text_heap", |b| b.iter(|| ShortText::new(black_box(&long))));
}

// ============================================================================
// Inbound callbacks
// ============================================================================

struct BenchKind;

impl CallbackKind for BenchKind {
    type Handler = dyn FnMut(f32) -> f32 + Send;
    const NAME: &'static str = "bench";

    fn registry() -> &'static CallbackRegistry<Self> {
        static REGISTRY: CallbackRegistry<BenchKind> = CallbackRegistry::new();
        &REGISTRY
    }
}

extern "C" fn bench_trampoline(elapsed: f32, refcon: *mut c_void) -> f32 {
    BenchKind::registry().dispatch(refcon, 0.0, |handler| handler(elapsed))
}

fn bench_callback_dispatch(c: &mut Criterion) {
    let pending = BenchKind::registry().begin(Box::new(|elapsed| black_box(elapsed) - 1.0));
    let refcon = pending.refcon();
    let id = pending.activate();

    c.bench_function("callback_dispatch_active", |b| {
        b.iter(|| bench_trampoline(black_box(0.016), refcon))
    });

    BenchKind::registry().unregister(id);
    c.bench_function("callback_dispatch_stale", |b| {
        b.iter(|| bench_trampoline(black_box(0.016), refcon))
    });
}

fn bench_registration_churn(c: &mut Criterion) {
    c.bench_function("callback_register_unregister", |b| {
        b.iter(|| {
            let id = BenchKind::registry().begin(Box::new(|_| 0.0)).activate();
            BenchKind::registry().unregister(black_box(id))
        })
    });
}

criterion_group!(outbound, bench_native_fn, bench_extern_function, bench_short_text);
criterion_group!(inbound, bench_callback_dispatch, bench_registration_churn);
criterion_main!(outbound, inbound);
