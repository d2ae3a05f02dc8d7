//! Per-packet name compression dictionary (`spec.md` §3 "Compression
//! dictionary entry" and §4.1 "Encoding with compression").
//!
//! The dictionary is a tree rooted at an implicit root node, flattened into
//! an arena (`entries`) addressed by index rather than by pointer, per the
//! "Dictionary as an arena" design note in `spec.md` §9. Each entry's label
//! bytes live in a second flat arena (`label_arena`); entries reference them
//! by `(start, len)` rather than storing a raw pointer, so the structure
//! stays safe Rust while keeping the same "labels survive until reset"
//! lifetime the spec describes.
//!
//! `spec.md` §9 also describes children as a contiguous, capacity-tracked
//! range within the entries array, relocated (with index fixups) when a
//! node's children outgrow their reserved slots. This implementation keeps
//! the arena-of-entries idea but gives each node its own small `Vec<u32>` of
//! child indices instead of a manually-managed contiguous range — the
//! externally observable behavior (reset cost, growth being amortized,
//! labels surviving until reset) is the same; see `DESIGN.md` for the
//! rationale.

use crate::name::DecodedName;
use crate::wire::Packet;

const ROOT: u32 = 0;
const LOCAL: u32 = 1;
const TCP: u32 = 2;

struct DictEntry {
    /// Offset into `label_arena` of this label's length-prefixed bytes.
    label_start: u32,
    children: Vec<u32>,
    /// Wire-ready back-pointer value (top two bits set), 0 if unemitted this packet.
    emitted_ptr: u16,
}

impl Clone for DictEntry {
    fn clone(&self) -> Self {
        Self {
            label_start: self.label_start,
            children: self.children.clone(),
            emitted_ptr: self.emitted_ptr,
        }
    }
}

pub struct CompressionDictionary {
    entries: Vec<DictEntry>,
    label_arena: Vec<u8>,
    seed_entries: Vec<DictEntry>,
    seed_arena_len: usize,
}

impl CompressionDictionary {
    pub fn new() -> Self {
        let mut label_arena = Vec::with_capacity(16);
        let root_label = label_arena.len() as u32; // root has no label; start is a placeholder
        label_arena.push(0); // zero-length label, never looked up or written

        let local_start = label_arena.len() as u32;
        label_arena.push(5);
        label_arena.extend_from_slice(b"local");

        let tcp_start = label_arena.len() as u32;
        label_arena.push(4);
        label_arena.extend_from_slice(b"_tcp");

        let seed_entries = vec![
            DictEntry {
                label_start: root_label,
                children: vec![LOCAL],
                emitted_ptr: 0,
            },
            DictEntry {
                label_start: local_start,
                children: vec![TCP],
                emitted_ptr: 0,
            },
            DictEntry {
                label_start: tcp_start,
                children: Vec::new(),
                emitted_ptr: 0,
            },
        ];
        let seed_arena_len = label_arena.len();

        // 16x the seed size, per spec.md §4.1's initial-allocation note; Vec
        // growth after that is the natural amortized-doubling equivalent of
        // "re-allocated multiplicatively when inserting would exceed capacity".
        let mut entries = Vec::with_capacity(seed_entries.len() * 16);
        entries.extend_from_slice_clone(&seed_entries);

        Self {
            entries,
            label_arena,
            seed_entries,
            seed_arena_len,
        }
    }

    /// Restores exactly the logical seed (root→local→_tcp, all unemitted).
    pub fn reset(&mut self) {
        self.entries.clear();
        self.entries.extend_from_slice_clone(&self.seed_entries);
        self.label_arena.truncate(self.seed_arena_len);
    }

    fn label_content<'a>(arena: &'a [u8], start: u32) -> &'a [u8] {
        let start = start as usize;
        let len = arena[start] as usize;
        &arena[start + 1..start + 1 + len]
    }

    fn find_child(&self, parent: u32, content: &[u8]) -> Option<u32> {
        self.entries[parent as usize]
            .children
            .iter()
            .copied()
            .find(|&c| Self::label_content(&self.label_arena, self.entries[c as usize].label_start) == content)
    }

    fn get_or_create_child(&mut self, parent: u32, label_wire: &[u8]) -> u32 {
        let content = &label_wire[1..];
        if let Some(existing) = self.find_child(parent, content) {
            return existing;
        }
        let start = self.label_arena.len() as u32;
        self.label_arena.extend_from_slice(label_wire);
        let idx = self.entries.len() as u32;
        self.entries.push(DictEntry {
            label_start: start,
            children: Vec::new(),
            emitted_ptr: 0,
        });
        self.entries[parent as usize].children.push(idx);
        idx
    }

    /// Encodes `name` into `out`, using and updating the dictionary.
    ///
    /// Walks from the root end (the label closest to the implicit root, i.e.
    /// the last label in `name`) inward, matching existing dictionary nodes
    /// as deep as possible and remembering the deepest one already emitted
    /// this packet. Labels inward of that point (never matched, or matched
    /// but not yet emitted) are written verbatim and recorded in the
    /// dictionary; the name ends in a back-pointer to the deepest emitted
    /// match, or a terminator if nothing usable was found.
    pub fn encode_name(&mut self, out: &mut Packet, name: &DecodedName) -> bool {
        let k = name.label_count();
        if k == 0 {
            return out.push_u8(0);
        }

        let mut parent = ROOT;
        let mut path: Vec<u32> = Vec::with_capacity(k);
        let mut deepest_emitted_pos: Option<usize> = None;

        for i in (0..k).rev() {
            let content = name.label_content(i);
            match self.find_child(parent, content) {
                Some(child) => {
                    parent = child;
                    path.push(child);
                    if self.entries[child as usize].emitted_ptr != 0 {
                        deepest_emitted_pos = Some(path.len() - 1);
                    }
                }
                None => break,
            }
        }

        let (anchor, m) = match deepest_emitted_pos {
            Some(p) => (Some(path[p]), k - 1 - p),
            None => (None, k),
        };

        // Re-walk from the anchor (or root) writing/creating nodes for the
        // unmatched inner labels, in tree order (outer to inner); then emit
        // their bytes in wire order (inner to outer is reversed back).
        let mut new_nodes: Vec<u32> = Vec::with_capacity(m);
        let mut walk_parent = anchor.unwrap_or(ROOT);
        for i in (0..m).rev() {
            let child = self.get_or_create_child(walk_parent, name.label_wire(i));
            new_nodes.push(child);
            walk_parent = child;
        }

        for (slot, &node) in new_nodes.iter().rev().enumerate() {
            let offset = out.len();
            if !out.push_bytes(name.label_wire(slot)) {
                return false;
            }
            if offset > 0x3FFF {
                // Offsets beyond 14 bits can't be represented as a back-pointer;
                // leave this node unemitted so later names fall back to verbatim.
                continue;
            }
            self.entries[node as usize].emitted_ptr = 0xC000 | offset as u16;
        }

        match anchor {
            Some(node) => out.push_u16(self.entries[node as usize].emitted_ptr),
            None => out.push_u8(0),
        }
    }
}

impl Default for CompressionDictionary {
    fn default() -> Self {
        Self::new()
    }
}

/// Small helper so `Vec<DictEntry>::extend_from_slice` reads naturally above
/// despite `DictEntry` not being `Copy` (it owns a `Vec<u32>`).
trait ExtendClone {
    fn extend_from_slice_clone(&mut self, other: &[DictEntry]);
}

impl ExtendClone for Vec<DictEntry> {
    fn extend_from_slice_clone(&mut self, other: &[DictEntry]) {
        self.extend(other.iter().cloned());
    }
}
