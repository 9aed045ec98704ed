//! Shared helpers for tests that run against the stub simulator library
//!
//! The `xpbind-stub` crate is built as a cdylib alongside the tests. Its artifact is
//! copied into a throwaway simulator root at the path the real `XPLM` library
//! would occupy, and the global session is initialized from there. Set
//! `XPBIND_STUB_LIBRARY` to point at a specific build of the stub.

#![allow(dead_code)]

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;
use xpbind_config::BindingConfig;
use xpbind_runtime::ffi::{library_path, LibraryKind, NativeFn};
use xpbind_runtime::{session, CommandRef, Session};

#[allow(unused_imports)]
pub use pretty_assertions::{assert_eq, assert_ne};

/// Get the stub session, failing the calling test when the stub is missing
#[macro_export]
macro_rules! stub_session {
    () => {
        match common::session() {
            Some(session) => session,
            None => panic!("xpbind-stub library not found; set XPBIND_STUB_LIBRARY"),
        }
    };
}

/// Locate the built stub library
pub fn stub_library() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("XPBIND_STUB_LIBRARY") {
        return Some(PathBuf::from(path));
    }

    // Test binaries live in target/<profile>/deps; the cdylib lands there or one up.
    let exe = std::env::current_exe().ok()?;
    let deps = exe.parent()?;
    let prefix = format!("{DLL_PREFIX}xpbind_stub");

    let found = [Some(deps), deps.parent()]
        .into_iter()
        .flatten()
        .filter_map(|dir| std::fs::read_dir(dir).ok())
        .flat_map(|entries| entries.flatten())
        .map(|entry| entry.path())
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.starts_with(&prefix) && name.ends_with(DLL_SUFFIX))
        });
    found
}

/// Build a simulator root holding `library` as its core library
pub fn install_stub(library: &Path) -> TempDir {
    let root = tempfile::tempdir().expect("create simulator root");
    let target = library_path(LibraryKind::Xplm, root.path());
    std::fs::create_dir_all(target.parent().expect("library directory"))
        .expect("create plugins directory");
    std::fs::copy(library, &target).expect("install stub library");
    root
}

/// A simulator root shared by every test in the binary
pub fn simulator_root() -> Option<&'static Path> {
    static ROOT: OnceLock<Option<TempDir>> = OnceLock::new();
    ROOT.get_or_init(|| stub_library().map(|library| install_stub(&library)))
        .as_ref()
        .map(TempDir::path)
}

/// The global session, initialized against the stub
pub fn session() -> Option<&'static Session> {
    let root = simulator_root()?;
    Some(session::init(root, &BindingConfig::default()).expect("stub session"))
}

/// Call one of the stub's `int Sim*(void)` hooks
pub fn sim(session: &Session, hook: &'static str) -> i32 {
    let f: NativeFn<unsafe extern "C" fn() -> i32> = unsafe { NativeFn::bind(session.xplm(), hook) };
    unsafe { f.call(()) }.expect(hook)
}

/// Reset the stub to a fresh simulator
pub fn reset(session: &Session) {
    let f: NativeFn<unsafe extern "C" fn()> = unsafe { NativeFn::bind(session.xplm(), "SimReset") };
    unsafe { f.call(()) }.expect("SimReset");
}

/// Times the simulator itself handled `command`
pub fn command_executions(session: &Session, command: CommandRef) -> i32 {
    let f: NativeFn<unsafe extern "C" fn(CommandRef) -> i32> =
        unsafe { NativeFn::bind(session.xplm(), "SimCommandExecutions") };
    unsafe { f.call((command,)) }.expect("SimCommandExecutions")
}

/// Whether any line the stub logged contains `needle`
pub fn log_contains(session: &Session, needle: &str) -> bool {
    let needle = std::ffi::CString::new(needle).expect("needle");
    let f: NativeFn<unsafe extern "C" fn(*const std::ffi::c_char) -> i32> =
        unsafe { NativeFn::bind(session.xplm(), "SimLogContains") };
    unsafe { f.call((needle.as_ptr(),)) }.expect("SimLogContains") != 0
}
