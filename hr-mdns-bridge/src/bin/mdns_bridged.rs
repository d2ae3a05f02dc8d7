//! Process entry point: parses the CLI, loads and validates the config,
//! builds sockets and interface records, and spawns one bridge worker per
//! address family with at least two enabled interfaces.
//!
//! Everything in this file is ambient plumbing around the core in
//! `hr_mdns_bridge::{decode, encode, filter, compress, bridge}` — `spec.md`
//! §1 puts CLI parsing, config loading, socket/interface setup, daemonization
//! and the PID file out of the core's scope.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use hr_mdns_bridge::bridge;
use hr_mdns_bridge::cli::Cli;
use hr_mdns_bridge::config::{Config, InterfaceSpec, ValidatedConfig};
use hr_mdns_bridge::interface::{build_fanout, Family, Interface};
use hr_mdns_bridge::logging;
use hr_mdns_bridge::pidfile;
use hr_mdns_bridge::signals;
use hr_mdns_bridge::socket::{self, BridgeSocket};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config file {}", cli.config.display()))?;
    let validated = config.validate().context("validating configuration")?;

    let foreground = cli.foreground || validated.foreground;
    if !foreground {
        daemonize().context("daemonizing")?;
    }

    let pid_path = cli
        .pid_file
        .clone()
        .or_else(|| validated.pid_file.as_ref().map(PathBuf::from));
    if let Some(path) = &pid_path {
        pidfile::write(path).with_context(|| format!("writing PID file {}", path.display()))?;
    }

    signals::install().context("installing signal handlers")?;

    let interfaces = build_interfaces(&validated).context("building interface records")?;
    let interfaces = Arc::new(interfaces);

    info!(
        count = interfaces.len(),
        "mdns-bridged starting, interfaces loaded"
    );

    let global_filter = validated.global_filter.clone();
    let warn_on_unsupported = validated.warn_on_unsupported;

    let mut handles = Vec::new();
    for family in Family::ALL {
        let enabled = interfaces.iter().filter(|i| i.enabled_for(family)).count();
        if enabled < 2 {
            info!(%family, enabled, "skipping worker: fewer than two enabled interfaces");
            continue;
        }
        let interfaces = interfaces.clone();
        let global_filter = global_filter.clone();
        let handle = std::thread::Builder::new()
            .name(format!("mdns-bridge-{family}"))
            .spawn(move || {
                if let Err(e) = bridge::run_worker(family, interfaces, global_filter, warn_on_unsupported) {
                    error!(%family, error = %e, "worker exited with an error");
                }
            })
            .with_context(|| format!("spawning {family} worker"))?;
        handles.push(handle);
    }

    if handles.is_empty() {
        anyhow::bail!("no address family has at least two enabled interfaces; nothing to bridge");
    }

    for handle in handles {
        let _ = handle.join();
    }

    if let Some(path) = &pid_path {
        pidfile::remove(path);
    }

    Ok(())
}

/// Builds the full `Interface` set from `validated`: resolves sockets for
/// every enabled (interface, family) pair, then derives the per-family peer
/// fan-out tables (`spec.md` §3 "Interface record").
fn build_interfaces(validated: &ValidatedConfig) -> Result<Vec<Interface>> {
    let mut interfaces = Vec::with_capacity(validated.interfaces.len());
    for spec in &validated.interfaces {
        let sockets = bind_sockets(spec)?;
        let disabled = [!spec.ipv4, !spec.ipv6];
        interfaces.push(Interface::new(
            spec.name.clone(),
            spec.os_index,
            disabled,
            sockets,
            spec.inbound_filter.clone(),
            spec.outbound_filter.clone(),
        ));
    }

    for family in Family::ALL {
        build_fanout(&mut interfaces, family);
    }

    Ok(interfaces)
}

fn bind_sockets(spec: &InterfaceSpec) -> Result<[Option<Box<dyn BridgeSocket>>; 2]> {
    let v4 = if spec.ipv4 {
        Some(Box::new(
            socket::bind_multicast(&spec.name, spec.os_index, Family::V4)
                .with_context(|| format!("binding IPv4 multicast socket on {}", spec.name))?,
        ) as Box<dyn BridgeSocket>)
    } else {
        None
    };
    let v6 = if spec.ipv6 {
        Some(Box::new(
            socket::bind_multicast(&spec.name, spec.os_index, Family::V6)
                .with_context(|| format!("binding IPv6 multicast socket on {}", spec.name))?,
        ) as Box<dyn BridgeSocket>)
    } else {
        None
    };
    Ok([v4, v6])
}

/// Detaches from the controlling terminal: forks once, has the parent exit
/// immediately, and calls `setsid` in the child so a later terminal hangup
/// doesn't reach it. `spec.md` §1 treats daemonization as out of the core's
/// scope; this is the thin ambient implementation the binary needs to honor
/// `--foreground`/`foreground` at all.
fn daemonize() -> std::io::Result<()> {
    // SAFETY: fork() is called before any additional threads exist in this
    // process (logging and signal handling are not installed yet), so there
    // is no risk of forking with another thread mid-mutation.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(std::io::Error::last_os_error());
    }
    if pid > 0 {
        std::process::exit(0);
    }
    // SAFETY: setsid() is async-signal-safe and takes no pointer arguments.
    if unsafe { libc::setsid() } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
