use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Verbosity comes from `RUST_LOG`,
/// defaulting to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();

    if let Err(e) = installed {
        eprintln!("Tracing subscriber already installed: {}", e);
    }
}
