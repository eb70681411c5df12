use std::io::Write;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use parking_lot::Mutex;

struct OpencmdLogger {
    file: Option<Mutex<std::fs::File>>,
    filter: LevelFilter,
    start: Instant,
}

impl Log for OpencmdLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        eprintln!(
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );

        if let Some(ref file) = self.file {
            let elapsed = self.start.elapsed().as_secs_f64();
            let _ = writeln!(
                file.lock(),
                "[{elapsed:.3}s] [{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        if let Some(ref file) = self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Level for a `-v` count: none is warn, then info, debug and trace.
#[must_use]
pub fn verbosity_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Filter from `RUST_LOG` when it parses, `fallback` otherwise.
#[must_use]
pub fn resolve_filter(rust_log: Option<&str>, fallback: LevelFilter) -> LevelFilter {
    rust_log
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(fallback)
}

/// Initialize the global logger. Call once, before any logging.
///
/// # Errors
///
/// Returns `SetLoggerError` if a logger is already installed.
pub fn init(verbose: u8, log_file: Option<std::fs::File>) -> Result<(), SetLoggerError> {
    let filter = resolve_filter(
        std::env::var("RUST_LOG").ok().as_deref(),
        verbosity_filter(verbose),
    );

    let logger = OpencmdLogger {
        file: log_file.map(Mutex::new),
        filter,
        start: Instant::now(),
    };

    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(filter);
    Ok(())
}
