//! Logging utilities, startup banner and crash reporting

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Environment variable that suppresses the startup banner when set to `1`
pub const QUIET_ENV: &str = "ANGENE_QUIET";

/// Initialize logging with a default level, still overridable by `RUST_LOG`
///
/// Safe to call more than once; later calls are ignored.
pub fn init_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}

/// Whether the quiet-mode environment toggle is set
pub fn quiet_from_env() -> bool {
    std::env::var(QUIET_ENV).map(|value| value == "1").unwrap_or(false)
}

/// Log the startup banner unless quiet mode is on
///
/// Returns whether the banner was printed.
pub fn print_banner(quiet: bool) -> bool {
    if quiet || quiet_from_env() {
        return false;
    }

    log::info!("Angene engine v{}", env!("CARGO_PKG_VERSION"));
    log::info!("  2D windows draw through the painter, 3D windows through a graphics binding");
    log::info!("  VR windows render per eye via OnRenderEye; set {}=1 to hide this banner", QUIET_ENV);
    true
}

/// Install a panic hook that logs the payload, location and backtrace
///
/// The previously installed hook still runs afterwards.
pub fn install_crash_handler() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_string());
        let location = info
            .location()
            .map_or_else(|| "<unknown>".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));

        log::error!("FATAL: panic: {} at {}", payload, location);
        log::error!("Backtrace:\n{}", std::backtrace::Backtrace::force_capture());
        previous(info);
    }));
}

/// Log an error together with every error in its `source()` chain
pub fn report_error_chain(context: &str, error: &dyn std::error::Error) {
    log::error!("{}: {}", context, error);
    let mut source = error.source();
    while let Some(cause) = source {
        log::error!("  caused by: {}", cause);
        source = cause.source();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_suppressed_when_quiet() {
        assert!(!print_banner(true));
    }
}
