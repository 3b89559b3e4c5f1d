/// Initializes the process-wide `tracing` subscriber. Internal
/// diagnostics (malformed sentinels, progress-store write failures,
/// etc.) go here, never to the terminal.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
