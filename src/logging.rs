use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber for hosts that want log output.
///
/// `RUST_LOG` takes precedence over `filter`; an empty `filter` means
/// `flightlog_compute=info`. Calling this twice is harmless: the second
/// subscriber is not installed.
pub fn init_logging(filter: &str) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::builder().from_env_lossy()
    } else if filter.trim().is_empty() {
        EnvFilter::builder().parse_lossy("flightlog_compute=info")
    } else {
        EnvFilter::builder().parse_lossy(filter)
    };

    let _ = tracing_subscriber::fmt::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}
