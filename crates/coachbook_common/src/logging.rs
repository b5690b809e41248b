//! Logging setup shared by the coachbook binaries and tests.
//!
//! Everything goes through `tracing`. The subscriber writes human readable lines to
//! stdout and, when `LOG_DIR` is set, also to a daily rolling file through a
//! non-blocking writer.

use tracing::{error, info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber at INFO.
///
/// ```
/// use coachbook_common::logging;
///
/// let _guard = logging::init();
/// ```
pub fn init() -> Option<WorkerGuard> {
    init_with_level(Level::INFO)
}

/// Initialize the tracing subscriber with a specific log level.
///
/// `RUST_LOG` directives are honoured on top of a `coachbook=<level>` default.
/// Uses `try_init`, so calling it again (for example from several tests) is a no-op.
/// Keep the returned guard alive for as long as file logging should flush.
pub fn init_with_level(level: Level) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(
        format!("coachbook={}", level)
            .parse()
            .unwrap_or_else(|_| LevelFilter::from_level(level).into()),
    );

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true);

    let (file_layer, guard) = match std::env::var("LOG_DIR") {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "coachbook.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    let result = tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(filter)
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
    guard
}

/// Log an error with context at the ERROR level.
pub fn log_error<E: std::fmt::Display>(error: E, context: &str) {
    error!("{}: {}", context, error);
}

/// Log a result, INFO on success and ERROR on failure, and hand it back unchanged.
pub fn log_result<T, E: std::fmt::Display>(
    result: Result<T, E>,
    success_message: &str,
    error_context: &str,
) -> Result<T, E> {
    match &result {
        Ok(_) => info!("{}", success_message),
        Err(e) => error!("{}: {}", error_context, e),
    }
    result
}
