//! Interface records and their per-family peer fan-out tables
//! (`spec.md` §3 "Interface record").

use std::fmt;
use std::sync::Arc;

use crate::filter::FilterList;
use crate::socket::BridgeSocket;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub const ALL: [Family; 2] = [Family::V4, Family::V6];

    fn idx(self) -> usize {
        match self {
            Family::V4 => 0,
            Family::V6 => 1,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::V4 => write!(f, "IPv4"),
            Family::V6 => write!(f, "IPv6"),
        }
    }
}

/// One configured network interface, plus the fan-out structures derived
/// from the full interface set during startup.
pub struct Interface {
    pub name: String,
    pub os_index: u32,
    /// `disabled[family]`: true if this interface is not bridged for that family.
    disabled: [bool; 2],
    /// `sockets[family]`: the bound datagram endpoint, if enabled for that family.
    sockets: [Option<Box<dyn BridgeSocket>>; 2],
    pub inbound_filter: Option<Arc<FilterList>>,
    pub outbound_filter: Option<Arc<FilterList>>,

    /// `peers[family]`: indices (into the owning `Vec<Interface>`) of other
    /// enabled interfaces in the same family, in configuration order.
    peers: [Vec<usize>; 2],
    /// `peer_nofilter_count[family]`: how many peers have no outbound filter.
    peer_nofilter_count: [usize; 2],
    /// `peer_filter_variants[family]`: distinct non-null outbound filter
    /// lists among peers, deduplicated by `Arc` pointer identity.
    peer_filter_variants: [Vec<Arc<FilterList>>; 2],
}

impl Interface {
    pub fn new(
        name: String,
        os_index: u32,
        disabled: [bool; 2],
        sockets: [Option<Box<dyn BridgeSocket>>; 2],
        inbound_filter: Option<Arc<FilterList>>,
        outbound_filter: Option<Arc<FilterList>>,
    ) -> Self {
        Self {
            name,
            os_index,
            disabled,
            sockets,
            inbound_filter,
            outbound_filter,
            peers: [Vec::new(), Vec::new()],
            peer_nofilter_count: [0, 0],
            peer_filter_variants: [Vec::new(), Vec::new()],
        }
    }

    pub fn disabled_for(&self, family: Family) -> bool {
        self.disabled[family.idx()]
    }

    pub fn enabled_for(&self, family: Family) -> bool {
        !self.disabled[family.idx()]
    }

    pub fn disable_for(&mut self, family: Family) {
        self.disabled[family.idx()] = true;
    }

    pub fn socket(&self, family: Family) -> Option<&dyn BridgeSocket> {
        self.sockets[family.idx()].as_deref()
    }

    pub fn peers(&self, family: Family) -> &[usize] {
        &self.peers[family.idx()]
    }

    pub fn peer_nofilter_count(&self, family: Family) -> usize {
        self.peer_nofilter_count[family.idx()]
    }

    pub fn peer_filter_variants(&self, family: Family) -> &[Arc<FilterList>] {
        &self.peer_filter_variants[family.idx()]
    }
}

/// Populates `peers`, `peer_nofilter_count` and `peer_filter_variants` for
/// every interface in `interfaces`, for `family`. An interface is never
/// listed as its own peer. If fewer than two interfaces are enabled for
/// `family`, every interface is disabled for that family (`spec.md` §3).
pub fn build_fanout(interfaces: &mut [Interface], family: Family) {
    let enabled_count = interfaces.iter().filter(|i| i.enabled_for(family)).count();
    if enabled_count < 2 {
        for iface in interfaces.iter_mut() {
            iface.disable_for(family);
        }
        return;
    }

    let enabled_indices: Vec<usize> = interfaces
        .iter()
        .enumerate()
        .filter(|(_, i)| i.enabled_for(family))
        .map(|(idx, _)| idx)
        .collect();

    for &me in &enabled_indices {
        let mut peers = Vec::new();
        let mut nofilter_count = 0usize;
        let mut variants: Vec<Arc<FilterList>> = Vec::new();

        for &other in &enabled_indices {
            if other == me {
                continue;
            }
            peers.push(other);
            match &interfaces[other].outbound_filter {
                None => nofilter_count += 1,
                Some(f) => {
                    if !variants.iter().any(|v| Arc::ptr_eq(v, f)) {
                        variants.push(f.clone());
                    }
                }
            }
        }

        let idx = family.idx();
        interfaces[me].peers[idx] = peers;
        interfaces[me].peer_nofilter_count[idx] = nofilter_count;
        interfaces[me].peer_filter_variants[idx] = variants;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_interface(name: &str, outbound: Option<Arc<FilterList>>) -> Interface {
        Interface::new(
            name.to_string(),
            0,
            [false, false],
            [None, None],
            None,
            outbound,
        )
    }

    #[test]
    fn fewer_than_two_enabled_disables_the_whole_family() {
        let mut ifaces = vec![bare_interface("eth0", None)];
        build_fanout(&mut ifaces, Family::V4);
        assert!(ifaces[0].disabled_for(Family::V4));
    }

    #[test]
    fn peers_exclude_self_and_are_ordered() {
        let mut ifaces = vec![
            bare_interface("a", None),
            bare_interface("b", None),
            bare_interface("c", None),
        ];
        build_fanout(&mut ifaces, Family::V4);
        assert_eq!(ifaces[0].peers(Family::V4), &[1, 2]);
        assert_eq!(ifaces[1].peers(Family::V4), &[0, 2]);
    }

    #[test]
    fn outbound_filter_variants_dedup_by_pointer_identity() {
        use crate::filter::{FilterMode, MatchName};
        let shared = Arc::new(FilterList::new(
            FilterMode::Deny,
            vec![MatchName::parse("_ssh").unwrap()],
        ));
        let mut ifaces = vec![
            bare_interface("a", None),
            bare_interface("b", Some(shared.clone())),
            bare_interface("c", Some(shared.clone())),
        ];
        build_fanout(&mut ifaces, Family::V4);
        assert_eq!(ifaces[0].peer_filter_variants(Family::V4).len(), 1);
        assert_eq!(ifaces[0].peer_nofilter_count(Family::V4), 0);
    }
}
