use clap::Parser;
use std::path::PathBuf;

/// Run the dock station firmware against simulated hardware.
#[derive(Debug, Parser)]
#[command(name = "dock-sim", version, about)]
pub struct Cli {
    /// Station configuration (JSON). Defaults apply when omitted.
    #[arg(long, short = 'c', env = "DOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Stop after this many loop iterations instead of running until Ctrl-C.
    #[arg(long, short = 'n')]
    pub iterations: Option<u64>,

    /// SQLite file holding the persisted state. Overrides the configuration.
    #[arg(long, short = 'd')]
    pub database: Option<PathBuf>,

    /// Let the simulated access point refuse connections.
    #[arg(long)]
    pub offline: bool,
}
