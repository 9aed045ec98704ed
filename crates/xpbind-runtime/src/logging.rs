//! Logging infrastructure
//!
//! Diagnostics go through `tracing`. [`init`] installs a global subscriber built from
//! the `[logging]` configuration:
//!
//! - `host`: every event becomes one `XPLMDebugString` call, so it lands in the
//!   simulator's `Log.txt`. Before the native session is up, lines go to stderr.
//! - `stderr`: plain stderr output.
//! - `file`: a log file written off-thread through `tracing-appender`.
//!
//! `RUST_LOG` takes precedence over the configured level.

use crate::error::BindingResult;
use crate::ffi::ShortText;
use crate::xplm::utilities::UtilitiesApi;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    registry::Registry,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};
use xpbind_config::{ConfigError, LogTarget, LoggingConfig};

// Keeps the file appender's worker alive until `flush`.
static FILE_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber
///
/// Only the first successful call in a process has an effect; later calls, or a
/// subscriber installed by someone else, leave the existing one in place.
pub fn init(config: &LoggingConfig) -> BindingResult<()> {
    let filter = build_filter(config);

    let (layer, guard) = match config.target {
        LogTarget::Host => (make_layer(config.json, false, HostWriter), None),
        LogTarget::Stderr => (make_layer(config.json, true, io::stderr), None),
        LogTarget::File => {
            let path = config.file.as_deref().ok_or_else(|| {
                ConfigError::ValidationError("logging.target = \"file\" requires logging.file".into())
            })?;
            let (writer, guard) = file_writer(path)?;
            (make_layer(config.json, false, writer), Some(guard))
        }
    };

    match tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
    {
        Ok(()) => {
            if let Some(guard) = guard {
                *FILE_GUARD.lock().unwrap_or_else(PoisonError::into_inner) = Some(guard);
            }
            tracing::debug!(level = %config.level, sink = ?config.target, "logging initialized");
        }
        Err(_) => {
            tracing::debug!("global subscriber already installed, keeping it");
        }
    }
    Ok(())
}

/// Flush and close the log file, if one is open
pub fn flush() {
    FILE_GUARD
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str()))
}

fn make_layer<W>(json: bool, ansi: bool, writer: W) -> BoxedLayer
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    if json {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer()
            .with_ansi(ansi)
            .with_target(true)
            .with_writer(writer)
            .boxed()
    }
}

fn file_writer(path: &Path) -> BindingResult<(NonBlocking, WorkerGuard)> {
    let file_name = path.file_name().ok_or_else(|| ConfigError::InvalidValue {
        field: "logging.file".to_string(),
        reason: format!("'{}' does not name a file", path.display()),
    })?;
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(directory).map_err(ConfigError::from)?;
    let appender = tracing_appender::rolling::never(directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// `MakeWriter` that forwards each formatted event to the simulator's log
#[derive(Debug, Clone, Copy, Default)]
pub struct HostWriter;

impl<'a> MakeWriter<'a> for HostWriter {
    type Writer = HostLine;

    fn make_writer(&'a self) -> HostLine {
        HostLine { buf: Vec::new() }
    }
}

/// One formatted event, emitted when dropped
pub struct HostLine {
    buf: Vec<u8>,
}

impl Write for HostLine {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for HostLine {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }

        if !send_to_host(&self.buf) {
            let _ = io::stderr().write_all(&self.buf);
        }
    }
}

/// Hand one formatted line to the simulator log; `false` if nothing is bound
fn send_to_host(bytes: &[u8]) -> bool {
    UtilitiesApi::try_global().is_some_and(|api| {
        // Field values may carry NUL bytes; the native log cannot.
        let text = String::from_utf8_lossy(bytes).replace('\0', "\u{fffd}");
        ShortText::new(&text)
            .and_then(|line| api.debug_string_raw(&line))
            .is_ok()
    })
}
