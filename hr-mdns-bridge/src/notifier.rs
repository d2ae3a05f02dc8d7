//! Readiness notifier (`spec.md` §4.5/§6): an add-fd / wait-for-ready
//! abstraction over whichever event API `mio` selects at compile time
//! (epoll on Linux, kqueue on BSD/macOS) — the "selection between two event
//! APIs" `spec.md` §1 explicitly puts outside the core.

use std::io;
use std::os::unix::io::RawFd;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use crate::socket::BridgeSocket;

/// Opaque readiness token; the bridge loop keys it by interface index so a
/// ready event can be mapped straight back to the `Interface` it belongs to.
pub type ReadyToken = usize;

pub struct Notifier {
    poll: Poll,
    events: Events,
}

impl Notifier {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(64),
        })
    }

    /// Registers `socket`'s file descriptor for read-readiness, keyed by `token`.
    pub fn register(&mut self, token: ReadyToken, socket: &dyn BridgeSocket) -> io::Result<()> {
        let fd: RawFd = socket.raw_fd();
        self.poll
            .registry()
            .register(&mut SourceFd(&fd), Token(token), Interest::READABLE)
    }

    /// Blocks until at least one registered socket is readable, then returns
    /// the tokens that became ready.
    pub fn wait(&mut self) -> io::Result<impl Iterator<Item = ReadyToken> + '_> {
        self.poll.poll(&mut self.events, None)?;
        Ok(self.events.iter().map(|e| e.token().0))
    }

    #[cfg(test)]
    pub fn wait_timeout(&mut self, timeout: std::time::Duration) -> io::Result<usize> {
        self.poll.poll(&mut self.events, Some(timeout))?;
        Ok(self.events.iter().count())
    }
}
