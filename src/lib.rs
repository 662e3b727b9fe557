use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
pub const GZIP_TRAILER_SIZE_LEN: i64 = 4;

pub mod archive;
pub mod cli;
pub mod concat;
pub mod config;
pub mod error;
pub mod group;
pub mod source;

pub use error::{Error, Result};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(on: bool) {
    VERBOSE.store(on, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Writes a timestamped line to stderr. Stdout belongs to the archive.
pub fn log_line(args: fmt::Arguments<'_>) {
    if !is_verbose() {
        return;
    }
    eprintln!(
        "[{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        args
    );
}

#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        $crate::log_line(format_args!($($arg)*))
    };
}
