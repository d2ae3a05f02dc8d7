//! Signal handling (`spec.md` §4.12, §7): "process termination is a signal
//! handler that exits the process; no graceful drain."

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::info;

/// Spawns a dedicated thread that blocks on `SIGTERM`/`SIGINT` and exits the
/// process as soon as either arrives. There is no shutdown channel back to
/// the workers: `spec.md` §7 specifies an immediate exit, not a drain.
pub fn install() -> std::io::Result<()> {
    let mut signals = Signals::new([SIGTERM, SIGINT])?;
    std::thread::Builder::new()
        .name("signal-handler".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "received shutdown signal, exiting");
                std::process::exit(0);
            }
        })?;
    Ok(())
}
