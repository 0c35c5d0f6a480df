//! Logger implementation for the log crate.

use core::fmt::{self, Display};
use core::sync::atomic::{AtomicU64, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::error::{TinyError, TinyResult};
use crate::println;

/// Tick shown in front of every record, published by the timer manager.
static LOG_TICK: AtomicU64 = AtomicU64::new(0);

pub struct SimpleLogger;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorCode {
    Red = 31,
    Yellow = 33,
    Green = 32,
    Cyan = 36,
    BrightBlack = 90,
}

impl Display for ColorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\u{1B}[{}m", *self as u8)
    }
}

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let color = match record.level() {
            Level::Error => ColorCode::Red,
            Level::Warn => ColorCode::Yellow,
            Level::Info => ColorCode::Green,
            Level::Debug => ColorCode::Cyan,
            Level::Trace => ColorCode::BrightBlack,
        };
        let file = record.file().unwrap_or("none");
        let line = record.line().unwrap_or(0);
        let tick = LOG_TICK.load(Ordering::Relaxed);
        let reset = "\u{1B}[0m";

        println!("[{tick:>8} {file}:{line}] {color}{}{reset}", record.args());
    }

    fn flush(&self) {}
}

/// Publishes the logical tick used as the record timestamp.
pub fn set_tick(tick: u64) {
    LOG_TICK.store(tick, Ordering::Relaxed);
}

fn level_filter(level: Option<&str>) -> LevelFilter {
    match level {
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// Installs the console logger. The level comes from `LOG` at build time.
pub fn init() -> TinyResult<()> {
    log::set_logger(&SimpleLogger).map_err(|_| TinyError::LoggerInitFailed)?;
    log::set_max_level(level_filter(option_env!("LOG")));
    Ok(())
}
