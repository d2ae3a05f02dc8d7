//! Core mDNS bridging library: decode, filter, re-encode, fan out.
//!
//! `spec.md` draws a hard line between the core (this crate's packet
//! pipeline: [`decode`], [`encode`], [`filter`], [`compress`], [`name`],
//! [`bridge`]) and the ambient collaborators around it (config loading, CLI
//! parsing, OS interface/socket setup, the readiness notifier, process
//! lifecycle, logging) that the binary in `src/bin/mdns_bridged.rs` wires
//! together.

pub mod bridge;
pub mod cli;
pub mod compress;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod filter;
pub mod iface;
pub mod interface;
pub mod logging;
pub mod name;
pub mod notifier;
pub mod pidfile;
pub mod signals;
pub mod socket;
pub mod wire;
