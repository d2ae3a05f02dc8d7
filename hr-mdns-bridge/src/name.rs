//! Decoded-name representation and the pointer-following wire decoder.
//!
//! Mirrors the name handling in `hr-dns`'s `packet.rs`, generalized to the
//! fixed-capacity, worker-local scratch form this crate's hot path needs
//! (no heap allocation per name).

use crate::error::DecodeError;
use crate::wire::{DNS_HEADER_SIZE, MAX_LABELS, MAX_LABEL_LEN, MAX_NAME_LEN};

/// A fully expanded wire name: length-prefixed labels plus terminator,
/// identical in layout to an uncompressed wire encoding (`spec.md` §3).
#[derive(Clone, Copy)]
pub struct DecodedName {
    bytes: [u8; MAX_NAME_LEN],
    len: usize,
    label_count: usize,
    /// Offset (into `bytes`) of each label's length byte, in top-down
    /// (first-label-first) order.
    label_offsets: [u16; MAX_LABELS],
}

impl DecodedName {
    pub fn empty() -> Self {
        Self {
            bytes: [0u8; MAX_NAME_LEN],
            len: 0,
            label_count: 0,
            label_offsets: [0u16; MAX_LABELS],
        }
    }

    pub fn as_wire_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn label_count(&self) -> usize {
        self.label_count
    }

    /// The length-prefixed bytes (length byte + content) of label `i`, in top-down order.
    pub fn label_wire(&self, i: usize) -> &[u8] {
        let off = self.label_offsets[i] as usize;
        let label_len = self.bytes[off] as usize;
        &self.bytes[off..off + 1 + label_len]
    }

    /// The content bytes (no length byte) of label `i`.
    pub fn label_content(&self, i: usize) -> &[u8] {
        let w = self.label_wire(i);
        &w[1..]
    }

    fn push_label(&mut self, content: &[u8]) -> Result<(), DecodeError> {
        if self.label_count >= MAX_LABELS {
            return Err(DecodeError::NameTooLong);
        }
        // Reserve one byte for the terminator that always follows the last label.
        if self.len + 1 + content.len() + 1 > MAX_NAME_LEN {
            return Err(DecodeError::NameTooLong);
        }
        self.label_offsets[self.label_count] = self.len as u16;
        self.bytes[self.len] = content.len() as u8;
        self.bytes[self.len + 1..self.len + 1 + content.len()].copy_from_slice(content);
        self.len += 1 + content.len();
        self.label_count += 1;
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), DecodeError> {
        if self.len + 1 > MAX_NAME_LEN {
            return Err(DecodeError::NameTooLong);
        }
        self.bytes[self.len] = 0;
        self.len += 1;
        Ok(())
    }
}

impl Default for DecodedName {
    fn default() -> Self {
        Self::empty()
    }
}

/// Decodes a name starting at `start` within `buf` (the whole DNS message,
/// so pointer targets resolve against absolute offsets). Returns the decoded
/// name and the offset immediately after the name's first pointer or its
/// terminator (`spec.md` §4.1).
pub fn decode_name(buf: &[u8], start: usize) -> Result<(DecodedName, usize), DecodeError> {
    let mut name = DecodedName::empty();
    let mut read_pos = start;
    let mut next_offset: Option<usize> = None;

    loop {
        let b = *buf.get(read_pos).ok_or(DecodeError::Truncated(read_pos))?;

        if b & 0xC0 == 0xC0 {
            let lo = *buf
                .get(read_pos + 1)
                .ok_or(DecodeError::Truncated(read_pos))?;
            let target = (((b & 0x3F) as usize) << 8) | lo as usize;
            if next_offset.is_none() {
                next_offset = Some(read_pos + 2);
            }
            if target < DNS_HEADER_SIZE || target >= read_pos {
                return Err(DecodeError::BadPointer(read_pos, target));
            }
            read_pos = target;
            continue;
        }

        if b == 0 {
            if next_offset.is_none() {
                next_offset = Some(read_pos + 1);
            }
            name.terminate()?;
            return Ok((name, next_offset.unwrap()));
        }

        if b as usize > MAX_LABEL_LEN {
            return Err(DecodeError::LabelTooLong(b as usize));
        }

        let label_len = b as usize;
        let content_start = read_pos + 1;
        let content_end = content_start + label_len;
        if content_end > buf.len() {
            return Err(DecodeError::Truncated(read_pos));
        }
        name.push_label(&buf[content_start..content_end])?;
        read_pos = content_end;
    }
}

/// Encodes `name` with no compression, for use by code paths (tests, fallback
/// construction) that don't need a dictionary. The hot encode path goes
/// through `compress::CompressionDictionary::encode_name` instead.
#[cfg(test)]
pub fn encode_name_uncompressed(out: &mut Vec<u8>, name: &DecodedName) {
    out.extend_from_slice(name.as_wire_bytes());
}
