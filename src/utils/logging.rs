//! Tracing subscriber setup

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "csv_reader_input=info";

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    // Ignore repeated initialization
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
