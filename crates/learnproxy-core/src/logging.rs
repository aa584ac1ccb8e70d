//! Structured logging initialization: a console-subscriber setup trimmed
//! to what this binary actually needs: no file rotation, no
//! OpenTelemetry layer.

use tracing_subscriber::EnvFilter;

/// Initialize a global `tracing` subscriber. Respects `RUST_LOG` if set,
/// otherwise falls back to `default_level` (e.g. `"info"`).
///
/// Safe to call at most once per process; a second call is a no-op whose
/// error is swallowed, since tests may share a process.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}
