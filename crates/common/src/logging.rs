//! Logging and tracing initialization.
//!
//! The export engine is embedded in a host application, which may already
//! own a global subscriber. Initialization therefore never panics and reports
//! whether this call installed the subscriber.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Crates whose events are kept when the filter is the bare default.
const ENGINE_TARGETS: &[&str] = &[
    "admock_capture_engine",
    "admock_render_engine",
    "admock_processing_core",
];

/// Initialize the tracing subscriber with the given configuration.
///
/// Returns `false` when another global subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    use tracing_subscriber::fmt;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| build_filter(config));

    let installed = if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_current_span(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };
    installed.is_ok()
}

/// Initialize logging with defaults (useful for tests and embedding hosts).
pub fn init_default_logging() -> bool {
    init_logging(&LoggingConfig::default())
}

/// Expand a bare level ("debug") into per-engine directives so that chatty
/// host crates stay at `warn`.
fn build_filter(config: &LoggingConfig) -> EnvFilter {
    let level = config.level.trim();
    if level.contains('=') || level.contains(',') {
        return EnvFilter::new(level);
    }
    let mut directives = vec!["warn".to_string()];
    directives.extend(ENGINE_TARGETS.iter().map(|target| format!("{target}={level}")));
    EnvFilter::new(directives.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_level_expands_to_engine_targets() {
        let filter = build_filter(&LoggingConfig {
            level: "debug".to_string(),
            json: false,
        });
        let rendered = filter.to_string();
        assert!(rendered.contains("admock_render_engine=debug"));
        assert!(rendered.contains("warn"));
    }

    #[test]
    fn test_explicit_directives_pass_through() {
        let filter = build_filter(&LoggingConfig {
            level: "admock_capture_engine=trace".to_string(),
            json: false,
        });
        assert_eq!(filter.to_string(), "admock_capture_engine=trace");
    }
}
