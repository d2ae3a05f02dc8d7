//! OS network interface name → index resolution (`spec.md` §4.7).

use std::ffi::CString;
use std::io;

/// Resolves `name` (e.g. `"eth0"`) to the OS interface index `libc` and the
/// kernel use to identify it, for multicast-group joins and IPv6 scope ids.
pub fn resolve(name: &str) -> io::Result<u32> {
    let cname = CString::new(name)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let idx = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if idx == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_resolves_on_any_linux_host() {
        // "lo" exists on every Linux box this daemon is expected to run on.
        let idx = resolve("lo");
        assert!(idx.is_ok());
    }

    #[test]
    fn unknown_name_is_an_error() {
        assert!(resolve("definitely-not-a-real-interface-xyz").is_err());
    }
}
