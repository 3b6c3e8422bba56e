use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "kp_importer_client=info,kp_importer=info";

/// Routes `tracing` output to stderr; stdout carries only the result object.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
