use tracing_subscriber::EnvFilter;

/// Install a compact subscriber for the test binary; later calls no-op so
/// every test can ask for it unconditionally.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
