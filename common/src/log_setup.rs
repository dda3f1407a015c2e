use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle};
use log::LevelFilter;

/// Highest verbosity understood by [`level_filter`].
pub const MAX_VERBOSITY: u8 = 4;

/// Maps a 0..=4 verbosity to a log level: error, warn, info, debug, trace.
/// Values above the maximum saturate to trace.
pub fn level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Starts file + console logging. Console output goes to stderr only,
/// leaving stdout to the program's own output. The returned handle must be
/// kept alive for as long as logging is needed.
pub fn setup_logging(verbosity: u8) -> LoggerHandle {
    let base_level = level_filter(verbosity).as_str().to_ascii_lowercase();

    Logger::try_with_env_or_str(base_level)
        .unwrap_or_else(|e| panic!("Logger initialization failed with {}", e))
        .log_to_file(
            FileSpec::default()
                .directory("logs")
                .basename("segmerge"),
        )
        .duplicate_to_stderr(Duplicate::All)
        .rotate(
            flexi_logger::Criterion::Size(1024 * 1024), //1MB
            flexi_logger::Naming::Timestamps,
            flexi_logger::Cleanup::KeepLogFiles(5),
        )
        .start()
        .unwrap_or_else(|e| panic!("Logger initialization failed with {}", e))
}
