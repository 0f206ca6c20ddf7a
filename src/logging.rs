use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "DASHD_LOG";

/// Logs go to stderr; stdout carries the response stream.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
