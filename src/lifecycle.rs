//! Process-level setup shared by the binary and embedders.

/// Initialize logging with tracing_subscriber. `RUST_LOG` overrides the defaults;
/// calling it twice is a no-op.
pub fn init_logging() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["sqlx=warn", "aeo_scoring=debug", "info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
