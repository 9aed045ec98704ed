//! Process-wide native library session
//!
//! The simulator's libraries are loaded once per process. `init` may be called from
//! several places (plugin start, tests, a lazily initialized wrapper); the first
//! caller to finish wins and every other caller receives the same session. A racing
//! loser's libraries are dropped, which only lowers the loader's reference count.
//!
//! There is no teardown: the session lives until the process exits.

use crate::error::{BindingError, BindingResult};
use crate::ffi::{ExportAddr, LibraryKind, NativeLibrary};
use crate::xplm::UtilitiesApi;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use xpbind_config::BindingConfig;

static SESSION: OnceLock<Session> = OnceLock::new();

/// The loaded SDK libraries
#[derive(Debug)]
pub struct Session {
    resources_root: PathBuf,
    xplm: NativeLibrary,
    widgets: Option<NativeLibrary>,
}

impl Session {
    /// Load the libraries below `resources_root` without touching the global session
    ///
    /// The core library is required. The widgets library is optional; a missing one is
    /// logged and the session carries on without it.
    pub fn load(resources_root: &Path, load_widgets: bool) -> BindingResult<Self> {
        let xplm = NativeLibrary::load(LibraryKind::Xplm, resources_root)?;

        let widgets = if load_widgets {
            match NativeLibrary::load(LibraryKind::Widgets, resources_root) {
                Ok(library) => Some(library),
                Err(error) => {
                    tracing::warn!(%error, "widgets library unavailable");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            resources_root: resources_root.to_path_buf(),
            xplm,
            widgets,
        })
    }

    pub fn resources_root(&self) -> &Path {
        &self.resources_root
    }

    /// The core `XPLM` library
    pub fn xplm(&self) -> &NativeLibrary {
        &self.xplm
    }

    /// A loaded library, if that kind was loaded
    pub fn library(&self, kind: LibraryKind) -> Option<&NativeLibrary> {
        match kind {
            LibraryKind::Xplm => Some(&self.xplm),
            LibraryKind::Widgets => self.widgets.as_ref(),
        }
    }

    /// Resolve an export; a library that was not loaded resolves nothing
    pub fn resolve(&self, kind: LibraryKind, name: &str) -> ExportAddr {
        self.library(kind)
            .map_or(ExportAddr::UNRESOLVED, |library| library.resolve(name))
    }
}

/// Initialize the global session
///
/// `host_root` is the simulator root the host reports; `[library] resources_root`
/// in the configuration overrides it. Returns the existing session if one is
/// already loaded, whatever root it was loaded from.
pub fn init(host_root: &Path, config: &BindingConfig) -> BindingResult<&'static Session> {
    if let Some(session) = SESSION.get() {
        return Ok(session);
    }

    let root = config.resources_root(host_root);
    let session = Session::load(root, config.library.load_widgets).map_err(|error| {
        tracing::error!(%error, "native session failed to initialize");
        error
    })?;

    let session = SESSION.get_or_init(|| session);

    // The host log writer only uses an already-bound API; binding from inside a
    // log write could re-enter the initializer.
    UtilitiesApi::bind_global(session.xplm());

    Ok(session)
}

/// The global session, once initialized
pub fn get() -> BindingResult<&'static Session> {
    SESSION.get().ok_or(BindingError::NotInitialized)
}

pub fn is_initialized() -> bool {
    SESSION.get().is_some()
}

/// Resolve an export through the global session
pub fn resolve(kind: LibraryKind, name: &str) -> BindingResult<ExportAddr> {
    Ok(get()?.resolve(kind, name))
}
