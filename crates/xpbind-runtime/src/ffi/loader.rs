//! Native library loading and export resolution
//!
//! Loads the simulator's plugin libraries with `libloading` and memoizes export
//! lookups. The simulator ships its SDK libraries under `Resources/plugins/` with
//! one naming scheme per platform:
//!
//! - Windows: `XPLM_64.dll`, `XPWidgets_64.dll`
//! - Linux: `XPLM_64.so`, `XPWidgets_64.so`
//! - macOS: `XPLM.framework/XPLM`, `XPWidgets.framework/XPWidgets`
//!
//! Exports never move while the library is loaded, so every lookup is cached for the
//! life of the [`NativeLibrary`], misses included.

use crate::error::{BindingError, BindingResult};
use libloading::Library;
use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// The SDK libraries the binding knows how to find
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryKind {
    /// Core plugin API (`XPLM`)
    Xplm,
    /// Widgets API (`XPWidgets`)
    Widgets,
}

impl LibraryKind {
    /// Short name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            LibraryKind::Xplm => "XPLM",
            LibraryKind::Widgets => "XPWidgets",
        }
    }

    /// Platform-specific artifact path, relative to `Resources/plugins`
    pub fn relative_path(self) -> PathBuf {
        if cfg!(target_os = "windows") {
            PathBuf::from(format!("{}_64.dll", self.name()))
        } else if cfg!(target_os = "macos") {
            PathBuf::from(format!("{}.framework", self.name())).join(self.name())
        } else {
            PathBuf::from(format!("{}_64.so", self.name()))
        }
    }
}

/// Full path of a library artifact under the simulator root
pub fn library_path(kind: LibraryKind, resources_root: &Path) -> PathBuf {
    resources_root
        .join("Resources")
        .join("plugins")
        .join(kind.relative_path())
}

/// A resolved export address, or the unresolved sentinel
///
/// Stored as an integer so the export table can be shared between threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportAddr(usize);

impl ExportAddr {
    /// The export does not exist in the loaded library
    pub const UNRESOLVED: ExportAddr = ExportAddr(0);

    /// Wrap a raw address; null maps to [`ExportAddr::UNRESOLVED`]
    #[inline]
    pub fn from_ptr(ptr: *const c_void) -> Self {
        ExportAddr(ptr as usize)
    }

    #[inline]
    pub fn is_resolved(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub fn as_ptr(self) -> *const c_void {
        self.0 as *const c_void
    }
}

/// A loaded native library with its memoized export table
///
/// # Safety
///
/// Loading a library runs its initialization code inside this process. Only the
/// simulator's own SDK libraries (or a test stand-in) should be loaded.
pub struct NativeLibrary {
    path: PathBuf,
    library: Library,
    exports: RwLock<HashMap<String, ExportAddr>>,
}

impl NativeLibrary {
    /// Load the platform artifact for `kind` below `resources_root`
    pub fn load(kind: LibraryKind, resources_root: &Path) -> BindingResult<Self> {
        Self::load_path(library_path(kind, resources_root))
    }

    /// Load a library from an explicit path
    pub fn load_path(path: impl AsRef<Path>) -> BindingResult<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(BindingError::LibraryLoadFailure {
                path,
                reason: "file does not exist".to_string(),
            });
        }

        let library = unsafe { Library::new(&path) }.map_err(|e| {
            BindingError::LibraryLoadFailure {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        tracing::info!(path = %path.display(), "loaded native library");

        Ok(Self {
            path,
            library,
            exports: RwLock::new(HashMap::new()),
        })
    }

    /// Resolve an export by name
    ///
    /// Idempotent: the first lookup is cached and every later call returns the same
    /// value. A missing export yields [`ExportAddr::UNRESOLVED`], also cached.
    pub fn resolve(&self, name: &str) -> ExportAddr {
        if let Some(addr) = self
            .exports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return *addr;
        }

        // Racing first lookups compute the same address; whichever lands first is kept.
        let addr = self.lookup(name);
        let mut exports = self.exports.write().unwrap_or_else(PoisonError::into_inner);
        let addr = *exports.entry(name.to_string()).or_insert(addr);

        if !addr.is_resolved() {
            tracing::debug!(export = name, library = %self.path.display(), "export not found");
        }
        addr
    }

    /// Resolve an export that the caller cannot do without
    pub fn require(&self, name: &str) -> BindingResult<ExportAddr> {
        let addr = self.resolve(name);
        if addr.is_resolved() {
            Ok(addr)
        } else {
            Err(BindingError::SymbolNotFound(name.to_string()))
        }
    }

    /// Check whether the library provides an export
    pub fn has_export(&self, name: &str) -> bool {
        self.resolve(name).is_resolved()
    }

    /// Path the library was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of names in the export table, hits and misses
    pub fn cached_exports(&self) -> usize {
        self.exports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lookup(&self, name: &str) -> ExportAddr {
        // The symbol is read as a bare address; no call is made through this type.
        match unsafe { self.library.get::<*const c_void>(name.as_bytes()) } {
            Ok(symbol) => ExportAddr::from_ptr(*symbol),
            Err(_) => ExportAddr::UNRESOLVED,
        }
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .field("cached_exports", &self.cached_exports())
            .finish()
    }
}
