//! PID file lifecycle for the daemonized case (`spec.md` §2 ambient
//! component table). Grounded on the `scriptum` daemon's `write_pid_file`/
//! `remove_pid_file` pair, simplified to the single-process, no-socket-
//! activation shape this bridge needs.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::{info, warn};

/// Writes the current process id to `path`, truncating any stale contents.
pub fn write(path: &Path) -> std::io::Result<()> {
    let pid = std::process::id();
    let mut file = fs::File::create(path)?;
    write!(file, "{pid}")?;
    info!(pid, path = %path.display(), "wrote PID file");
    Ok(())
}

/// Removes `path`, logging (but not failing) if it is already gone.
pub fn remove(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(error = %e, path = %path.display(), "failed to remove PID file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("hr-mdns-bridge-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn writes_the_current_pid() {
        let path = temp_path("write");
        write(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let pid: u32 = contents.parse().unwrap();
        assert_eq!(pid, std::process::id());
        remove(&path);
    }

    #[test]
    fn remove_is_idempotent() {
        let path = temp_path("remove");
        write(&path).unwrap();
        remove(&path);
        assert!(!path.exists());
        remove(&path); // should not panic on a missing file
    }
}
