use tracing_subscriber::EnvFilter;

/// Installs JSON log lines on stderr, filtered by `RUST_LOG` (default `info`).
///
/// Timestamps are left to CloudWatch, which stamps every line on ingestion.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(false)
        .with_current_span(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}
