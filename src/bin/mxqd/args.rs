use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(about, long_about = None, version)]
pub struct Args {
    /// Address to listen on.
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)))]
    pub listen: IpAddr,
    /// (TCP) port to listen on.
    #[arg(short, long, default_value_t = 21012)]
    pub port: u16,
    /// Runs as a background daemon. Parsed but not implemented — process
    /// bootstrap/daemonization is an external collaborator of this engine.
    #[arg(long, default_value_t)]
    pub daemon: bool,
    /// Enables the periodic background snapshot.
    #[arg(long, default_value_t = true)]
    pub bgsave: bool,
    /// Disables the periodic background snapshot.
    #[arg(long, default_value_t, conflicts_with = "bgsave")]
    pub no_bgsave: bool,
    /// Seconds between background snapshot attempts.
    #[arg(long, default_value_t = 300)]
    pub bgsave_interval: i64,
    /// Dirty-counter threshold that forces an immediate snapshot.
    #[arg(long, default_value_t = 1000)]
    pub bgsave_changes: u64,
    /// Path to the snapshot file.
    #[arg(long, default_value = "mx-queued.db")]
    pub bgsave_path: PathBuf,
    /// Seconds a touched job is held in the recycle pool before expiring.
    #[arg(long, default_value_t = 60)]
    pub recycle_timeout: i64,
    /// Optional credential file (`user:pass` per line) gating all commands
    /// but `ping`/`auth` until a connection authenticates.
    #[arg(long)]
    pub auth_file: Option<PathBuf>,
    /// Writes logs to this file instead of stdout.
    #[arg(long)]
    pub log_path: Option<PathBuf>,
    /// Minimum log level: error, notice, or debug.
    #[arg(long, default_value = "notice")]
    pub log_level: String,
    /// Enables human-friendly trace-level logging, overriding --log-level.
    #[arg(long, default_value_t)]
    pub debug: bool,
}

impl Args {
    pub fn bgsave_enabled(&self) -> bool {
        self.bgsave && !self.no_bgsave
    }
}
