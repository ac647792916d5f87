use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global subscriber. `CAPSYNC_LOG` wins over `RUST_LOG`;
/// without either, `verbose` picks debug over info. Output goes to stderr
/// so the demo's JSON report keeps stdout to itself.
pub fn init_logging(verbose: bool) {
    let filter = std::env::var("CAPSYNC_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map_or_else(
            |_| {
                if verbose {
                    EnvFilter::new("debug")
                } else {
                    EnvFilter::new("info")
                }
            },
            |value| EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new("info")),
        );

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to set the global subscriber: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(false);
        init_logging(false);
    }
}
