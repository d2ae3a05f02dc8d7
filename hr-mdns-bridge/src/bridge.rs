//! The per-address-family bridge loop (`spec.md` §4.5/§5): one worker per
//! family with at least two enabled interfaces, cooperative single-threaded
//! event loop, worker-local scratch, no locks on the packet path.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::compress::CompressionDictionary;
use crate::decode::{decode, ParsedMessage};
use crate::encode::encode;
use crate::filter::FilterList;
use crate::interface::{Family, Interface};
use crate::notifier::Notifier;
use crate::socket::group_addr;
use crate::wire::Packet;

/// Runs the bridge loop for `family` until the process exits. `interfaces`
/// is the full, shared interface set (`spec.md` §5 "shared immutable
/// state") — this worker only ever touches the slots enabled for `family`.
pub fn run_worker(
    family: Family,
    interfaces: Arc<Vec<Interface>>,
    global_filter: Option<Arc<FilterList>>,
    warn_on_unsupported: bool,
) -> std::io::Result<()> {
    let mut notifier = Notifier::new()?;
    for (idx, iface) in interfaces.iter().enumerate() {
        if let Some(socket) = iface.enabled_for(family).then(|| iface.socket(family)).flatten() {
            notifier.register(idx, socket)?;
        }
    }

    // If nothing anywhere configures a filter, the worker never needs to
    // understand the packet at all — pure byte relay (`spec.md` §8 scenario 1).
    let filtering_enabled = global_filter.is_some()
        || interfaces
            .iter()
            .any(|i| i.enabled_for(family) && (i.inbound_filter.is_some() || i.outbound_filter.is_some()));

    let mut recv_buf = [0u8; crate::wire::MAX_PACKET_SIZE];
    let mut parsed = ParsedMessage::default();
    let mut dict = CompressionDictionary::new();
    let mut encoded = Packet::new();

    loop {
        for token in notifier.wait()? {
            let ingress = &interfaces[token];
            let socket = match ingress.socket(family) {
                Some(s) => s,
                None => continue,
            };
            let (len, _src) = match socket.recv_from(&mut recv_buf) {
                Ok(r) => r,
                Err(e) => {
                    debug!(interface = %ingress.name, error = %e, "recv failed");
                    continue;
                }
            };
            let datagram = &recv_buf[..len];

            if !filtering_enabled {
                dispatch_raw(&interfaces, ingress.peers(family), family, datagram);
                continue;
            }

            if let Err(e) = decode(
                datagram,
                global_filter.as_deref(),
                ingress.inbound_filter.as_deref(),
                warn_on_unsupported,
                &mut parsed,
            ) {
                warn!(interface = %ingress.name, error = %e, "dropping malformed or fully-filtered packet");
                continue;
            }

            if ingress.peer_nofilter_count(family) > 0 {
                if parsed.identical_to_source() {
                    dispatch_raw_to(&interfaces, ingress.peers(family), family, datagram, |p| {
                        p.outbound_filter.is_none()
                    });
                } else if encode(&parsed, datagram, &mut dict, None, &mut encoded) {
                    dispatch_raw_to(
                        &interfaces,
                        ingress.peers(family),
                        family,
                        encoded.as_slice(),
                        |p| p.outbound_filter.is_none(),
                    );
                }
            }

            for variant in ingress.peer_filter_variants(family) {
                if encode(&parsed, datagram, &mut dict, Some(variant), &mut encoded) {
                    dispatch_raw_to(
                        &interfaces,
                        ingress.peers(family),
                        family,
                        encoded.as_slice(),
                        |p| {
                            p.outbound_filter
                                .as_ref()
                                .is_some_and(|f| Arc::ptr_eq(f, variant))
                        },
                    );
                }
            }
        }
    }
}

/// Sends `bytes` verbatim to every peer in `peer_indices` (used for the
/// filtering-disabled fast path, where every peer gets the same datagram).
fn dispatch_raw(interfaces: &[Interface], peer_indices: &[usize], family: Family, bytes: &[u8]) {
    dispatch_raw_to(interfaces, peer_indices, family, bytes, |_| true)
}

fn dispatch_raw_to(
    interfaces: &[Interface],
    peer_indices: &[usize],
    family: Family,
    bytes: &[u8],
    matches: impl Fn(&Interface) -> bool,
) {
    for &idx in peer_indices {
        let peer = &interfaces[idx];
        if !matches(peer) {
            continue;
        }
        let Some(socket) = peer.socket(family) else {
            continue;
        };
        let dest = group_addr(family, peer.os_index);
        if let Err(e) = socket.send_to(bytes, &dest) {
            debug!(interface = %peer.name, error = %e, "send failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterMode, MatchName};
    use crate::interface::build_fanout;
    use std::net::SocketAddr;
    use std::os::unix::io::RawFd;
    use std::sync::Mutex;

    use crate::socket::BridgeSocket;

    /// An in-memory stand-in for a bound multicast socket: `send_to` records
    /// the payload instead of putting it on the wire, so the dispatch
    /// ordering/content can be asserted without real sockets.
    struct FakeSocket {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl FakeSocket {
        fn new() -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            (Self { sent: sent.clone() }, sent)
        }
    }

    impl BridgeSocket for FakeSocket {
        fn recv_from(&self, _buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
            Err(std::io::Error::new(std::io::ErrorKind::WouldBlock, "no data"))
        }

        fn send_to(&self, buf: &[u8], _dest: &SocketAddr) -> std::io::Result<usize> {
            self.sent.lock().unwrap().push(buf.to_vec());
            Ok(buf.len())
        }

        fn raw_fd(&self) -> RawFd {
            -1
        }
    }

    fn push_name(buf: &mut Vec<u8>, labels: &[&[u8]]) {
        for l in labels {
            buf.push(l.len() as u8);
            buf.extend_from_slice(l);
        }
        buf.push(0);
    }

    fn a_record_packet(owner: &[&[u8]]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0x1234u16.to_be_bytes());
        buf.extend_from_slice(&0x8400u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        push_name(&mut buf, owner);
        buf.extend_from_slice(&crate::wire::rtype::A.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&120u32.to_be_bytes());
        buf.extend_from_slice(&4u16.to_be_bytes());
        buf.extend_from_slice(&[10, 0, 0, 1]);
        buf
    }

    #[test]
    fn raw_dispatch_sends_verbatim_to_every_matching_peer() {
        let (sock_a, _log_a) = FakeSocket::new();
        let (sock_b, log_b) = FakeSocket::new();
        let (sock_c, log_c) = FakeSocket::new();

        let a = Interface::new(
            "a".into(),
            1,
            [false, false],
            [Some(Box::new(sock_a)), None],
            None,
            None,
        );
        let b = Interface::new(
            "b".into(),
            2,
            [false, false],
            [Some(Box::new(sock_b)), None],
            None,
            None,
        );
        let c = Interface::new(
            "c".into(),
            3,
            [false, false],
            [Some(Box::new(sock_c)), None],
            None,
            None,
        );
        let mut ifaces = vec![a, b, c];
        build_fanout(&mut ifaces, Family::V4);

        let payload = a_record_packet(&[b"host", b"local"]);
        dispatch_raw(&ifaces, ifaces[0].peers(Family::V4), Family::V4, &payload);

        assert_eq!(log_b.lock().unwrap().as_slice(), &[payload.clone()]);
        assert_eq!(log_c.lock().unwrap().as_slice(), &[payload]);
    }

    #[test]
    fn dedup_key_groups_equal_outbound_filters_into_one_variant() {
        let shared = Arc::new(FilterList::new(
            FilterMode::Deny,
            vec![MatchName::parse("_ssh").unwrap()],
        ));
        let a = Interface::new("a".into(), 1, [false, false], [None, None], None, None);
        let b = Interface::new(
            "b".into(),
            2,
            [false, false],
            [None, None],
            None,
            Some(shared.clone()),
        );
        let c = Interface::new(
            "c".into(),
            3,
            [false, false],
            [None, None],
            None,
            Some(shared.clone()),
        );
        let mut ifaces = vec![a, b, c];
        build_fanout(&mut ifaces, Family::V4);
        assert_eq!(ifaces[0].peer_filter_variants(Family::V4).len(), 1);
        assert_eq!(ifaces[0].peer_nofilter_count(Family::V4), 0);
    }
}
