//! Tracing setup.
//!
//! Logs go to stderr. `RUST_LOG` overrides the level picked from the
//! command line.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init(verbose: bool) {
    let level = if verbose { "sitesync=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}
