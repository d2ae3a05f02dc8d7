//! Packet encoder (`spec.md` §4.3): rebuilds an outbound datagram from a
//! decoded message, applying outbound filtering and name compression.

use crate::compress::CompressionDictionary;
use crate::decode::{filter_target, FilterTarget, ParsedMessage};
use crate::filter::FilterList;
use crate::wire::{self, Packet, DNS_HEADER_SIZE, SRV_FIXED_SIZE};

fn admits(filter: Option<&FilterList>, bytes: &[u8]) -> bool {
    filter.map_or(true, |f| f.admits(bytes))
}

/// Re-encodes `parsed` (already inbound-filtered, decoded from `src`) into
/// `out`, dropping anything `outbound_filter` excludes. Returns `false` (and
/// leaves `out` empty) if nothing survives, per `spec.md` §4.3 "the encoder
/// returns 0 and no datagram is sent".
pub fn encode(
    parsed: &ParsedMessage,
    src: &[u8],
    dict: &mut CompressionDictionary,
    outbound_filter: Option<&FilterList>,
    out: &mut Packet,
) -> bool {
    dict.reset();
    out.clear();

    out.push_u16(parsed.id);
    out.push_u16(parsed.flags);
    let counts_offset = out.len();
    out.push_u16(0); // qdcount
    out.push_u16(0); // ancount
    out.push_u16(0); // nscount
    out.push_u16(0); // arcount

    let mut qdcount = 0u16;
    for q in &parsed.queries {
        if !q.kept || !admits(outbound_filter, q.name.as_wire_bytes()) {
            continue;
        }
        dict.encode_name(out, &q.name);
        out.push_u16(q.qtype);
        out.push_u16(q.qclass);
        qdcount += 1;
    }

    let mut ancount = 0u16;
    let mut nscount = 0u16;
    let mut arcount = 0u16;

    for rec in &parsed.records {
        if !rec.kept {
            continue;
        }
        let filter_bytes = match filter_target(rec.rtype) {
            FilterTarget::Owner => Some(rec.name.as_wire_bytes()),
            FilterTarget::RdataName => {
                rec.rdata_name.as_ref().map(|n| n.as_wire_bytes())
            }
            FilterTarget::Unfiltered => None,
        };
        if let Some(bytes) = filter_bytes {
            if !admits(outbound_filter, bytes) {
                continue;
            }
        }

        dict.encode_name(out, &rec.name);
        out.push_u16(rec.rtype);
        out.push_u16(rec.rclass);
        out.push_u32(rec.ttl);
        let rdlen_offset = out.len();
        out.push_u16(0);
        let rdata_begin = out.len();

        match filter_target(rec.rtype) {
            FilterTarget::RdataName => {
                let name = rec.rdata_name.as_ref().expect("decode.rs sets this for PTR/CNAME/DNAME");
                dict.encode_name(out, name);
            }
            _ if rec.rtype == wire::rtype::SRV => {
                let fixed_end = rec.rdata_start + SRV_FIXED_SIZE;
                out.push_bytes(&src[rec.rdata_start..fixed_end]);
                let target = rec.rdata_name.as_ref().expect("decode.rs sets this for SRV");
                dict.encode_name(out, target);
            }
            _ if rec.rtype == wire::rtype::NSEC => {
                let name = rec.rdata_name.as_ref().expect("decode.rs sets this for NSEC");
                dict.encode_name(out, name);
                let bitmap_start = rec.rdata_start + rec.rdata_len - rec.secondary_len;
                let bitmap_end = rec.rdata_start + rec.rdata_len;
                out.push_bytes(&src[bitmap_start..bitmap_end]);
            }
            _ => {
                let rdata_end = rec.rdata_start + rec.rdata_len;
                out.push_bytes(&src[rec.rdata_start..rdata_end]);
            }
        }

        let emitted_len = (out.len() - rdata_begin) as u16;
        out.patch_u16(rdlen_offset, emitted_len);

        match rec.section {
            crate::decode::Section::Answer => ancount += 1,
            crate::decode::Section::Authority => nscount += 1,
            crate::decode::Section::Additional => arcount += 1,
        }
    }

    if qdcount == 0 && ancount == 0 && nscount == 0 && arcount == 0 {
        out.clear();
        return false;
    }

    out.patch_u16(counts_offset, qdcount);
    out.patch_u16(counts_offset + 2, ancount);
    out.patch_u16(counts_offset + 4, nscount);
    out.patch_u16(counts_offset + 6, arcount);
    true
}
