pub fn init() {
    // Honors RUST_LOG (e.g. "debug"), default info. Logs go to stderr so
    // stdio mode keeps stdout for the protocol.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
