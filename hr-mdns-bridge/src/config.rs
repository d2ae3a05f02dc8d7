//! On-disk configuration (`spec.md` §4.6): JSON deserialized into `Config`,
//! validated into a `ValidatedConfig` the rest of the crate consumes.
//!
//! The wire format is JSON rather than the original INI-style file — the
//! teacher's own config modules (`hr-dns::config`, `hr-dhcp::config`) already
//! deserialize their on-disk shape with `serde`/`serde_json`, and `spec.md`
//! treats the on-disk syntax as out of scope, so this follows the teacher's
//! convention rather than reinventing a parser.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::filter::{FilterList, FilterMode, MatchName};
use crate::iface;
use crate::interface::Family;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub ipv4: bool,
    #[serde(default = "default_true")]
    pub ipv6: bool,
    #[serde(default)]
    pub inbound_allow: Option<Vec<String>>,
    #[serde(default)]
    pub inbound_deny: Option<Vec<String>>,
    #[serde(default)]
    pub outbound_allow: Option<Vec<String>>,
    #[serde(default)]
    pub outbound_deny: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
    #[serde(default)]
    pub global_allow: Option<Vec<String>>,
    #[serde(default)]
    pub global_deny: Option<Vec<String>>,
    #[serde(default)]
    pub warn_on_unsupported: bool,
    #[serde(default)]
    pub foreground: bool,
    #[serde(default)]
    pub pid_file: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse(path.display().to_string(), e))
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        if self.interfaces.is_empty() {
            return Err(ConfigError::NoInterfaces);
        }

        let mut seen_names = std::collections::HashSet::new();
        for iface in &self.interfaces {
            if !seen_names.insert(iface.name.clone()) {
                return Err(ConfigError::DuplicateInterface(iface.name.clone()));
            }
            if !iface.ipv4 && !iface.ipv6 {
                return Err(ConfigError::DisabledOnEveryFamily(iface.name.clone()));
            }
        }

        let global_filter = build_scope_filter(
            "global",
            self.global_allow.as_deref(),
            self.global_deny.as_deref(),
        )?
        .map(Arc::new);

        // Outbound filter lists are interned by structural dedup key so
        // peers sharing the same policy share one `Arc` (`spec.md` §4.4);
        // this is what lets the bridge loop later compare variants by
        // pointer identity instead of by value.
        let mut outbound_interned: HashMap<u64, Arc<FilterList>> = HashMap::new();

        let mut specs = Vec::with_capacity(self.interfaces.len());
        for iface in &self.interfaces {
            let inbound_filter = build_scope_filter(
                &iface.name,
                iface.inbound_allow.as_deref(),
                iface.inbound_deny.as_deref(),
            )?;
            let inbound_filter = elide_if_matches_global(inbound_filter, global_filter.as_deref());

            let outbound_filter = match build_scope_filter(
                &iface.name,
                iface.outbound_allow.as_deref(),
                iface.outbound_deny.as_deref(),
            )? {
                Some(list) => {
                    let key = list.dedup_key();
                    let arc = outbound_interned
                        .entry(key)
                        .or_insert_with(|| Arc::new(list))
                        .clone();
                    Some(arc)
                }
                None => None,
            };

            let os_index = iface::resolve(&iface.name)
                .map_err(|e| ConfigError::InterfaceNotFound(iface.name.clone(), e))?;

            specs.push(InterfaceSpec {
                name: iface.name.clone(),
                os_index,
                ipv4: iface.ipv4,
                ipv6: iface.ipv6,
                inbound_filter,
                outbound_filter,
            });
        }

        let eligible = |family: Family| {
            specs
                .iter()
                .filter(|s| match family {
                    Family::V4 => s.ipv4,
                    Family::V6 => s.ipv6,
                })
                .count()
                >= 2
        };
        if !eligible(Family::V4) && !eligible(Family::V6) {
            return Err(ConfigError::NothingToBridge);
        }

        Ok(ValidatedConfig {
            interfaces: specs,
            global_filter,
            warn_on_unsupported: self.warn_on_unsupported,
            foreground: self.foreground,
            pid_file: self.pid_file,
        })
    }
}

fn build_scope_filter(
    scope_name: &str,
    allow: Option<&[String]>,
    deny: Option<&[String]>,
) -> Result<Option<FilterList>, ConfigError> {
    match (allow, deny) {
        (Some(_), Some(_)) if scope_name == "global" => Err(ConfigError::DuplicateGlobalFilter),
        (Some(_), Some(_)) => Err(ConfigError::ConflictingFilterLists(scope_name.to_string())),
        (Some(names), None) => Ok(Some(FilterList::new(FilterMode::Allow, parse_names(names)?))),
        (None, Some(names)) => Ok(Some(FilterList::new(FilterMode::Deny, parse_names(names)?))),
        (None, None) => Ok(None),
    }
}

/// A per-interface inbound filter identical to the global one is silently
/// elided: the global filter already covers it (`spec.md` §4.4).
fn elide_if_matches_global(
    inbound: Option<FilterList>,
    global: Option<&FilterList>,
) -> Option<Arc<FilterList>> {
    match inbound {
        Some(list) if Some(&list) == global => None,
        Some(list) => Some(Arc::new(list)),
        None => None,
    }
}

fn parse_names(names: &[String]) -> Result<Vec<MatchName>, ConfigError> {
    names.iter().map(|s| MatchName::parse(s)).collect()
}

/// The validated, per-interface facts the core needs to build sockets and
/// `Interface` records; everything here is immutable for the process lifetime.
pub struct InterfaceSpec {
    pub name: String,
    pub os_index: u32,
    pub ipv4: bool,
    pub ipv6: bool,
    pub inbound_filter: Option<Arc<FilterList>>,
    pub outbound_filter: Option<Arc<FilterList>>,
}

/// The "validated configuration object" `spec.md` §6 says the core consumes.
/// Socket construction still happens afterward in `main`, since binding is an
/// external collaborator the core only ever talks to through `BridgeSocket`.
pub struct ValidatedConfig {
    pub interfaces: Vec<InterfaceSpec>,
    pub global_filter: Option<Arc<FilterList>>,
    pub warn_on_unsupported: bool,
    pub foreground: bool,
    pub pid_file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            interfaces: vec![
                InterfaceConfig {
                    name: "lo".to_string(),
                    ipv4: true,
                    ipv6: true,
                    inbound_allow: None,
                    inbound_deny: None,
                    outbound_allow: None,
                    outbound_deny: None,
                },
                InterfaceConfig {
                    name: "lo".to_string(),
                    ipv4: true,
                    ipv6: true,
                    inbound_allow: None,
                    inbound_deny: None,
                    outbound_allow: None,
                    outbound_deny: None,
                },
            ],
            ..Config::default()
        }
    }

    #[test]
    fn empty_interface_list_is_fatal() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::NoInterfaces));
    }

    #[test]
    fn duplicate_interface_name_is_fatal() {
        let err = base_config().validate().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateInterface(n) if n == "lo"));
    }

    #[test]
    fn conflicting_inbound_lists_are_fatal() {
        let mut cfg = base_config();
        cfg.interfaces.truncate(1);
        cfg.interfaces[0].inbound_allow = Some(vec!["_ipp".to_string()]);
        cfg.interfaces[0].inbound_deny = Some(vec!["_ssh".to_string()]);
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingFilterLists(n) if n == "lo"));
    }

    #[test]
    fn interface_disabled_on_every_family_is_fatal() {
        let mut cfg = base_config();
        cfg.interfaces.truncate(1);
        cfg.interfaces[0].ipv4 = false;
        cfg.interfaces[0].ipv6 = false;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::DisabledOnEveryFamily(n) if n == "lo"));
    }

    #[test]
    fn identical_outbound_filters_share_one_arc() {
        let mut cfg = base_config();
        cfg.interfaces[0].name = "lo".to_string();
        cfg.interfaces[1].name = "lo0".to_string();
        cfg.interfaces[0].outbound_deny = Some(vec!["_ssh".to_string()]);
        cfg.interfaces[1].outbound_deny = Some(vec!["_ssh".to_string()]);

        // "lo0" won't resolve on most hosts; this test only exercises the
        // interning logic, so stop short of the OS-resolution step by
        // checking the filters directly instead of calling validate().
        let a = build_scope_filter("lo", None, cfg.interfaces[0].outbound_deny.as_deref())
            .unwrap()
            .unwrap();
        let b = build_scope_filter("lo0", None, cfg.interfaces[1].outbound_deny.as_deref())
            .unwrap()
            .unwrap();
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn inbound_filter_matching_global_is_elided() {
        let global = build_scope_filter("global", Some(&["_ipp".to_string()]), None)
            .unwrap()
            .map(Arc::new);
        let same_as_global = build_scope_filter("lo", Some(&["_ipp".to_string()]), None).unwrap();
        let different = build_scope_filter("lo0", Some(&["_ssh".to_string()]), None).unwrap();

        assert!(elide_if_matches_global(same_as_global, global.as_deref()).is_none());
        assert!(elide_if_matches_global(different, global.as_deref()).is_some());
    }

    #[test]
    fn two_global_filter_lists_is_fatal() {
        let err = build_scope_filter(
            "global",
            Some(&["_ipp".to_string()]),
            Some(&["_ssh".to_string()]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateGlobalFilter));
    }
}
