//! Packet decoder (`spec.md` §4.2): header parsing, per-section name/record
//! decoding, per-type RDATA handling, and inbound filter evaluation.

use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::filter::FilterList;
use crate::name::{decode_name, DecodedName};
use crate::wire::{
    self, rtype, DNS_HEADER_SIZE, MAX_QUERIES, MAX_RECORDS, QUERY_HEADER_SIZE, RR_HEADER_SIZE,
    SRV_FIXED_SIZE,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Answer,
    Authority,
    Additional,
}

pub struct ParsedQuery {
    pub name: DecodedName,
    pub qtype: u16,
    pub qclass: u16,
    pub kept: bool,
}

pub struct ParsedRecord {
    pub name: DecodedName,
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub rdata_start: usize,
    pub rdata_len: usize,
    /// SRV: length of the fixed priority/weight/port prefix (6).
    /// NSEC: length of the trailing type-bitmap.
    /// All other types: unused (0).
    pub secondary_len: usize,
    pub rdata_name: Option<DecodedName>,
    pub section: Section,
    pub kept: bool,
}

#[derive(Default)]
pub struct ParsedMessage {
    pub id: u16,
    pub flags: u16,
    pub queries: Vec<ParsedQuery>,
    pub records: Vec<ParsedRecord>,
    /// Records dropped for an unsupported type, never reaching `records` at
    /// all. Needed to tell whether the raw received bytes still represent
    /// exactly the kept set (`spec.md` §4.5 step 3).
    pub dropped_unsupported: usize,
}

impl ParsedMessage {
    fn clear(&mut self) {
        self.id = 0;
        self.flags = 0;
        self.queries.clear();
        self.records.clear();
        self.dropped_unsupported = 0;
    }

    pub fn any_kept(&self) -> bool {
        self.queries.iter().any(|q| q.kept) || self.records.iter().any(|r| r.kept)
    }

    /// True if nothing was dropped or filtered: the raw bytes this message
    /// was decoded from already represent exactly the kept set, so they can
    /// be forwarded verbatim instead of re-encoded.
    pub fn identical_to_source(&self) -> bool {
        self.dropped_unsupported == 0
            && self.queries.iter().all(|q| q.kept)
            && self.records.iter().all(|r| r.kept)
    }
}

fn passes_filters(global: Option<&FilterList>, iface: Option<&FilterList>, name: &[u8]) -> bool {
    global.map_or(true, |f| f.admits(name)) && iface.map_or(true, |f| f.admits(name))
}

/// Which name a given record type is filtered against (`spec.md` §4.2/§4.3):
/// owner name for SRV/TXT/HINFO/SVCB/HTTPS, RDATA name for PTR/CNAME/DNAME,
/// unfiltered for A/AAAA/OPT/NSEC. The encoder reuses this for outbound
/// filtering, since it applies to "the same domain-name target as inbound
/// filtering for the same types".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterTarget {
    Owner,
    RdataName,
    Unfiltered,
}

pub fn filter_target(rtype_val: u16) -> FilterTarget {
    match rtype_val {
        rtype::PTR | rtype::CNAME | rtype::DNAME => FilterTarget::RdataName,
        rtype::SRV | rtype::TXT | rtype::HINFO | rtype::SVCB | rtype::HTTPS => FilterTarget::Owner,
        _ => FilterTarget::Unfiltered,
    }
}

/// Decodes `buf` into `out` (worker-local scratch, reused and cleared on
/// every call), applying inbound filtering as records are parsed.
pub fn decode(
    buf: &[u8],
    global_filter: Option<&FilterList>,
    iface_filter: Option<&FilterList>,
    warn_on_unsupported: bool,
    out: &mut ParsedMessage,
) -> Result<(), DecodeError> {
    out.clear();

    let id = wire::read_u16(buf, 0).ok_or(DecodeError::Truncated(0))?;
    let flags = wire::read_u16(buf, 2).ok_or(DecodeError::Truncated(2))?;
    let qdcount = wire::read_u16(buf, 4).ok_or(DecodeError::Truncated(4))? as usize;
    let ancount = wire::read_u16(buf, 6).ok_or(DecodeError::Truncated(6))? as usize;
    let nscount = wire::read_u16(buf, 8).ok_or(DecodeError::Truncated(8))? as usize;
    let arcount = wire::read_u16(buf, 10).ok_or(DecodeError::Truncated(10))? as usize;

    if qdcount > MAX_QUERIES {
        return Err(DecodeError::TooManyRecords(qdcount, MAX_QUERIES));
    }
    let total_rr = ancount + nscount + arcount;
    if total_rr > MAX_RECORDS {
        return Err(DecodeError::TooManyRecords(total_rr, MAX_RECORDS));
    }

    out.id = id;
    out.flags = flags;

    let mut offset = DNS_HEADER_SIZE;

    for _ in 0..qdcount {
        let (name, next) = decode_name(buf, offset)?;
        offset = next;
        let qtype = wire::read_u16(buf, offset).ok_or(DecodeError::Truncated(offset))?;
        let qclass =
            wire::read_u16(buf, offset + 2).ok_or(DecodeError::Truncated(offset + 2))?;
        offset += QUERY_HEADER_SIZE;

        let kept = passes_filters(global_filter, iface_filter, name.as_wire_bytes());
        out.queries.push(ParsedQuery {
            name,
            qtype,
            qclass,
            kept,
        });
    }

    let sections = [
        (ancount, Section::Answer),
        (nscount, Section::Authority),
        (arcount, Section::Additional),
    ];

    for (count, section) in sections {
        for _ in 0..count {
            offset = decode_record(
                buf,
                offset,
                section,
                global_filter,
                iface_filter,
                warn_on_unsupported,
                out,
            )?;
        }
    }

    if offset != buf.len() {
        return Err(DecodeError::TrailingBytes(buf.len() - offset));
    }

    if !out.any_kept() {
        return Err(DecodeError::EmptyAfterFilter);
    }

    Ok(())
}

/// Decodes one resource record starting at `offset`, possibly dropping it
/// (unsupported type) without pushing anything. Returns the offset of the
/// next record.
#[allow(clippy::too_many_arguments)]
fn decode_record(
    buf: &[u8],
    offset: usize,
    section: Section,
    global_filter: Option<&FilterList>,
    iface_filter: Option<&FilterList>,
    warn_on_unsupported: bool,
    out: &mut ParsedMessage,
) -> Result<usize, DecodeError> {
    let (name, next) = decode_name(buf, offset)?;
    let mut offset = next;

    let rtype_val = wire::read_u16(buf, offset).ok_or(DecodeError::Truncated(offset))?;
    let rclass = wire::read_u16(buf, offset + 2).ok_or(DecodeError::Truncated(offset + 2))?;
    let ttl = wire::read_u32(buf, offset + 4).ok_or(DecodeError::Truncated(offset + 4))?;
    let rdlen = wire::read_u16(buf, offset + 8).ok_or(DecodeError::Truncated(offset + 8))? as usize;
    offset += RR_HEADER_SIZE;

    if rdlen == 0 {
        return Err(DecodeError::ZeroRdata);
    }
    let rdata_start = offset;
    let rdata_end = rdata_start
        .checked_add(rdlen)
        .ok_or(DecodeError::RdataOverrun(rdata_start, rdlen))?;
    if rdata_end > buf.len() {
        return Err(DecodeError::RdataOverrun(rdata_start, rdlen));
    }

    let mut secondary_len = 0usize;
    let mut rdata_name: Option<DecodedName> = None;

    match rtype_val {
        rtype::PTR | rtype::CNAME | rtype::DNAME => {
            let (n, n_next) = decode_name(buf, rdata_start)?;
            if n_next != rdata_end {
                return Err(DecodeError::NameOverrunsRdata);
            }
            rdata_name = Some(n);
        }
        rtype::SRV => {
            if rdata_start + SRV_FIXED_SIZE > rdata_end {
                return Err(DecodeError::RdataOverrun(rdata_start, rdlen));
            }
            let (n, n_next) = decode_name(buf, rdata_start + SRV_FIXED_SIZE)?;
            if n_next != rdata_end {
                return Err(DecodeError::NameOverrunsRdata);
            }
            secondary_len = SRV_FIXED_SIZE;
            rdata_name = Some(n);
        }
        rtype::TXT | rtype::HINFO | rtype::SVCB | rtype::HTTPS => {
            // Opaque, filtered by owner name.
        }
        rtype::A | rtype::AAAA | rtype::OPT => {
            // Opaque, not filtered.
        }
        rtype::NSEC => {
            let (n, n_next) = decode_name(buf, rdata_start)?;
            if n_next > rdata_end {
                return Err(DecodeError::NameOverrunsRdata);
            }
            secondary_len = rdata_end - n_next;
            rdata_name = Some(n);
            // Not filtered.
        }
        other => {
            if warn_on_unsupported {
                warn!(rtype = other, "dropping record with unsupported type");
            } else {
                debug!(rtype = other, "dropping record with unsupported type");
            }
            out.dropped_unsupported += 1;
            return Ok(rdata_end);
        }
    }

    let kept = match filter_target(rtype_val) {
        FilterTarget::RdataName => {
            let bytes = rdata_name.as_ref().expect("set above").as_wire_bytes();
            passes_filters(global_filter, iface_filter, bytes)
        }
        FilterTarget::Owner => passes_filters(global_filter, iface_filter, name.as_wire_bytes()),
        FilterTarget::Unfiltered => true,
    };

    out.records.push(ParsedRecord {
        name,
        rtype: rtype_val,
        rclass,
        ttl,
        rdata_start,
        rdata_len: rdlen,
        secondary_len,
        rdata_name,
        section,
        kept,
    });

    Ok(rdata_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterMode, MatchName};
    use crate::wire::DNS_HEADER_SIZE;

    fn push_name(buf: &mut Vec<u8>, labels: &[&[u8]]) {
        for l in labels {
            buf.push(l.len() as u8);
            buf.extend_from_slice(l);
        }
        buf.push(0);
    }

    fn header(qd: u16, an: u16, ns: u16, ar: u16) -> Vec<u8> {
        let mut h = Vec::with_capacity(DNS_HEADER_SIZE);
        h.extend_from_slice(&0x1234u16.to_be_bytes());
        h.extend_from_slice(&0x8400u16.to_be_bytes());
        h.extend_from_slice(&qd.to_be_bytes());
        h.extend_from_slice(&an.to_be_bytes());
        h.extend_from_slice(&ns.to_be_bytes());
        h.extend_from_slice(&ar.to_be_bytes());
        h
    }

    fn push_a_record(buf: &mut Vec<u8>, labels: &[&[u8]], ip: [u8; 4]) {
        push_name(buf, labels);
        buf.extend_from_slice(&rtype::A.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&120u32.to_be_bytes());
        buf.extend_from_slice(&4u16.to_be_bytes());
        buf.extend_from_slice(&ip);
    }

    #[test]
    fn decodes_a_single_a_record_with_no_filters() {
        let mut buf = header(0, 1, 0, 0);
        push_a_record(&mut buf, &[b"host", b"local"], [10, 0, 0, 1]);

        let mut out = ParsedMessage::default();
        decode(&buf, None, None, false, &mut out).unwrap();
        assert_eq!(out.records.len(), 1);
        assert!(out.records[0].kept);
    }

    #[test]
    fn unsupported_type_is_dropped_without_error() {
        let mut buf = header(0, 2, 0, 0);
        push_a_record(&mut buf, &[b"host", b"local"], [10, 0, 0, 1]);
        // MX (15), opaque 2-byte preference + name omitted for simplicity
        push_name(&mut buf, &[b"host", b"local"]);
        buf.extend_from_slice(&15u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&120u32.to_be_bytes());
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(&[0, 10]);

        let mut out = ParsedMessage::default();
        decode(&buf, None, None, false, &mut out).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].rtype, rtype::A);
    }

    #[test]
    fn global_allow_filters_srv_by_owner_name() {
        let mut buf = header(0, 2, 0, 0);
        let push_srv = |buf: &mut Vec<u8>, owner: &[&[u8]], target: &[&[u8]]| {
            push_name(buf, owner);
            buf.extend_from_slice(&rtype::SRV.to_be_bytes());
            buf.extend_from_slice(&1u16.to_be_bytes());
            buf.extend_from_slice(&120u32.to_be_bytes());
            let rdata_start_marker = buf.len();
            buf.extend_from_slice(&0u16.to_be_bytes()); // placeholder rdlen
            let rdata_begin = buf.len();
            buf.extend_from_slice(&0u16.to_be_bytes()); // priority
            buf.extend_from_slice(&0u16.to_be_bytes()); // weight
            buf.extend_from_slice(&0u16.to_be_bytes()); // port
            push_name(buf, target);
            let rdlen = (buf.len() - rdata_begin) as u16;
            buf[rdata_start_marker..rdata_start_marker + 2].copy_from_slice(&rdlen.to_be_bytes());
        };
        push_srv(
            &mut buf,
            &[b"Office", b"_ipp", b"_tcp", b"local"],
            &[b"officeprinter", b"local"],
        );
        push_srv(
            &mut buf,
            &[b"Laptop", b"_ssh", b"_tcp", b"local"],
            &[b"laptop", b"local"],
        );

        let global = FilterList::new(FilterMode::Allow, vec![MatchName::parse("_ipp").unwrap()]);
        let mut out = ParsedMessage::default();
        decode(&buf, Some(&global), None, false, &mut out).unwrap();

        assert_eq!(out.records.len(), 2);
        assert!(out.records[0].kept);
        assert!(!out.records[1].kept);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut buf = header(0, 1, 0, 0);
        push_a_record(&mut buf, &[b"host", b"local"], [10, 0, 0, 1]);
        buf.push(0xFF);

        let mut out = ParsedMessage::default();
        let err = decode(&buf, None, None, false, &mut out).unwrap_err();
        assert_eq!(err, DecodeError::TrailingBytes(1));
    }

    #[test]
    fn drops_whole_packet_when_everything_is_filtered_out() {
        let mut buf = header(0, 1, 0, 0);
        push_a_record(&mut buf, &[b"host", b"local"], [10, 0, 0, 1]);
        // A records are unfiltered and thus always kept; use TXT instead so
        // the owner-name filter can actually exclude it.
        let mut buf2 = header(0, 1, 0, 0);
        push_name(&mut buf2, &[b"Laptop", b"_ssh", b"_tcp", b"local"]);
        buf2.extend_from_slice(&rtype::TXT.to_be_bytes());
        buf2.extend_from_slice(&1u16.to_be_bytes());
        buf2.extend_from_slice(&120u32.to_be_bytes());
        buf2.extend_from_slice(&1u16.to_be_bytes());
        buf2.push(0);

        let global = FilterList::new(FilterMode::Allow, vec![MatchName::parse("_ipp").unwrap()]);
        let mut out = ParsedMessage::default();
        let err = decode(&buf2, Some(&global), None, false, &mut out).unwrap_err();
        assert_eq!(err, DecodeError::EmptyAfterFilter);
        let _ = buf;
    }
}
