//! Match names and filter lists (`spec.md` §3 "Match name"/"Filter list",
//! §4.4 "Filter Construction and Deduplication").

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::ConfigError;

/// An immutable, length-prefixed label sequence used as a filter pattern.
/// Layout is identical to a wire-form name without the terminator, so it can
/// be searched as a contiguous byte subsequence of a target name's bytes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchName(Box<[u8]>);

impl MatchName {
    /// Parses a dotted filter string (e.g. `"_ipp"`, `"_ipp._tcp"`) into its
    /// length-prefixed wire encoding.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        if s.is_empty() {
            return Err(ConfigError::InvalidFilterName(
                s.to_string(),
                "empty filter string".to_string(),
            ));
        }
        let mut bytes = Vec::with_capacity(s.len() + 1);
        for label in s.split('.') {
            if label.is_empty() || label.len() > 63 {
                return Err(ConfigError::InvalidFilterName(
                    s.to_string(),
                    format!("label {label:?} must be 1-63 bytes"),
                ));
            }
            bytes.push(label.len() as u8);
            bytes.extend_from_slice(label.as_bytes());
        }
        Ok(Self(bytes.into_boxed_slice()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Allow,
    Deny,
}

/// A sorted, deduplicated list of match names plus an allow-or-deny mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterList {
    pub mode: FilterMode,
    names: Vec<MatchName>,
}

impl FilterList {
    pub fn new(mode: FilterMode, mut names: Vec<MatchName>) -> Self {
        names.sort();
        names.dedup();
        Self { mode, names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// A filter list admits `name_bytes` iff (`spec.md` §4.2):
    /// - mode = ALLOW and at least one match name is a contiguous byte
    ///   subsequence of `name_bytes`, or
    /// - mode = DENY and no match name is a contiguous byte subsequence.
    pub fn admits(&self, name_bytes: &[u8]) -> bool {
        let any_match = self
            .names
            .iter()
            .any(|m| contains_subsequence(name_bytes, m.as_bytes()));
        match self.mode {
            FilterMode::Allow => any_match,
            FilterMode::Deny => !any_match,
        }
    }

    /// A stable hash over mode + ordered match-name bytes, used to intern
    /// structurally-identical filter lists to a single shared instance
    /// (`spec.md` §4.4: "adopt a single shared instance by pointer identity").
    pub fn dedup_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.mode.hash(&mut hasher);
        self.names.hash(&mut hasher);
        hasher.finish()
    }
}

fn contains_subsequence(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return needle.is_empty();
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_bytes(labels: &[&[u8]]) -> Vec<u8> {
        let mut v = Vec::new();
        for l in labels {
            v.push(l.len() as u8);
            v.extend_from_slice(l);
        }
        v.push(0);
        v
    }

    #[test]
    fn allow_matches_contiguous_label() {
        let list = FilterList::new(FilterMode::Allow, vec![MatchName::parse("_ipp").unwrap()]);
        let n = name_bytes(&[b"Printer", b"_ipp", b"_tcp", b"local"]);
        assert!(list.admits(&n));
        let n2 = name_bytes(&[b"Laptop", b"_ssh", b"_tcp", b"local"]);
        assert!(!list.admits(&n2));
    }

    #[test]
    fn deny_excludes_matching_name_only() {
        let list = FilterList::new(FilterMode::Deny, vec![MatchName::parse("_ssh").unwrap()]);
        let n = name_bytes(&[b"Laptop", b"_ssh", b"_tcp", b"local"]);
        assert!(!list.admits(&n));
        let n2 = name_bytes(&[b"Laptop", b"_airplay", b"_tcp", b"local"]);
        assert!(list.admits(&n2));
    }

    #[test]
    fn sorts_and_dedups_match_names() {
        let list = FilterList::new(
            FilterMode::Allow,
            vec![
                MatchName::parse("_ssh").unwrap(),
                MatchName::parse("_ipp").unwrap(),
                MatchName::parse("_ssh").unwrap(),
            ],
        );
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn identical_lists_share_a_dedup_key() {
        let a = FilterList::new(FilterMode::Deny, vec![MatchName::parse("_ssh").unwrap()]);
        let b = FilterList::new(FilterMode::Deny, vec![MatchName::parse("_ssh").unwrap()]);
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_oversized_label() {
        let long = "a".repeat(64);
        assert!(MatchName::parse(&long).is_err());
    }
}
