use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber for the reminder service.
///
/// Honours `RUST_LOG` when set and falls back to `info`, which keeps the
/// per-tick publish/skip messages visible without the scheduler's
/// minute-by-minute debug noise. Must run once, before configuration is
/// loaded, so rule-file problems are reported through the subscriber.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Tracing subscriber installed");
}
