//! Stderr logging for the runner, driven by `-v` and `RUST_LOG`.

use log::{LevelFilter, SetLoggerError};

/// Maps the number of `-v` flags to a level: warnings by default, then
/// info, debug and trace.
pub const fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn builder(verbosity: u8) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level_for_verbosity(verbosity))
        .parse_default_env()
        .format_timestamp(None)
        .target(env_logger::Target::Stderr);
    builder
}

/// Installs the stderr logger. `RUST_LOG`, when set, overrides the level
/// chosen by `verbosity`.
pub fn init(verbosity: u8) -> Result<(), SetLoggerError> {
    builder(verbosity).try_init()
}
