//! Command-line interface (`spec.md` §4.11).

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "mdns-bridged", about = "Bridges mDNS traffic between local network interfaces")]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long)]
    pub config: PathBuf,

    /// Stay attached to the controlling terminal instead of daemonizing.
    #[arg(long)]
    pub foreground: bool,

    /// Overrides the configured PID file path.
    #[arg(long)]
    pub pid_file: Option<PathBuf>,

    /// Increases log verbosity; repeatable.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
