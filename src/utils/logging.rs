/// Initialize tracing/logging for the application.
///
/// `level` is one of `error`, `warn`, `info`, `debug`, `trace`; anything
/// else falls back to `info`.
pub fn init(level: &str) {
    let lvl = parse_level(level);

    // try_init: tests and the binary may both call this
    let _ = tracing_subscriber::fmt()
        .with_max_level(lvl)
        .with_target(false)
        .try_init();
}

pub(crate) fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" | "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    }
}
