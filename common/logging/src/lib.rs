use slog::Logger;
use sloggers::types::Severity;
use sloggers::Build;

/// Return a logger suitable for test usage.
///
/// By default no logs will be printed, but they can be enabled via the `test_logger` feature:
///
/// ```bash
/// $ cargo test -p fork_choice --features 'logging/test_logger'
/// ```
///
/// Without the feature `test_logger()` returns a null logger and no log information will be
/// displayed.
pub fn test_logger() -> Logger {
    if cfg!(feature = "test_logger") {
        terminal_logger(Severity::Debug)
    } else {
        null_logger()
    }
}

/// A logger which writes to stderr at or above `level`, falling back to a null logger if the
/// terminal cannot be opened.
pub fn terminal_logger(level: Severity) -> Logger {
    sloggers::terminal::TerminalLoggerBuilder::new()
        .level(level)
        .destination(sloggers::terminal::Destination::Stderr)
        .build()
        .unwrap_or_else(|_| null_logger())
}

/// A logger which discards everything.
pub fn null_logger() -> Logger {
    sloggers::null::NullLoggerBuilder
        .build()
        .unwrap_or_else(|_| Logger::root(slog::Discard, slog::o!()))
}
