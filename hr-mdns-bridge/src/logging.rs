//! Logging setup (`spec.md` §4.10), modeled on `homeroute::main`'s
//! `tracing_subscriber::fmt` initialization.

use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber. `verbosity` is the repeated
/// `-v` count from the CLI: 0 keeps the crate at `info`, 1+ switches it (and
/// only it) to `debug`, mirroring `homeroute`'s `"info,homeroute=debug"`
/// default filter string.
pub fn init(verbosity: u8) {
    let default_filter = if verbosity > 0 {
        "info,hr_mdns_bridge=debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}
