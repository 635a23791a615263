//! Structured logging wired onto the console collaborator, in the same
//! shape as the source kernel's own logger: a `log::Log` implementation
//! that writes level-tagged lines through whichever console is registered,
//! with the active level controlled by the `LOG` environment variable at
//! build time, defaulting to off.

use core::fmt::Write;
use core::sync::atomic::{AtomicBool, Ordering};

use alloc::string::String;
use log::{LevelFilter, Log, Metadata, Record};

use crate::hal::console_write;

static BOOTED: AtomicBool = AtomicBool::new(false);

struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !BOOTED.load(Ordering::Relaxed) || !self.enabled(record.metadata()) {
            return;
        }
        let mut line = String::new();
        let _ = write!(line, "[{:>5}] {}\n", record.level(), record.args());
        console_write(line.as_bytes());
    }

    fn flush(&self) {}
}

/// Installs the kernel's `log::Log` implementation. Idempotent past the
/// first call, matching `log::set_logger`'s own contract, so every
/// `Kernel::new` can call it unconditionally.
pub fn init() {
    static LOGGER: KernelLogger = KernelLogger;
    if log::set_logger(&LOGGER).is_err() {
        return;
    }
    log::set_max_level(match option_env!("LOG") {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    });
    BOOTED.store(true, Ordering::Relaxed);
    log::info!("[log] logging initialized");
}
