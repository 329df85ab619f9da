// MIT License - Copyright (c) 2026 Peter Wright
// Tracing subscriber setup for applications embedding the bridge

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// The systemd journal already adds timestamps, so they are omitted when
/// running under systemd. Returns `false` if a global subscriber was already
/// installed.
pub fn init_logging() -> bool {
    init_logging_with("info")
}

/// Like [`init_logging`] with a custom default directive.
pub fn init_logging_with(default_directive: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt()
            .without_time()
            .with_env_filter(env_filter)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .try_init()
            .is_ok()
    }
}
