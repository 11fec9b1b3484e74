//! Startup configuration.
//!
//! Every setting has a default matching the usual Flutter web layout, so the
//! binary runs with no arguments from a project root. Values can be overridden
//! on the command line or through `RELOADSERVE_*` environment variables:
//!
//! ```bash
//! reloadserve --root dist --port 8080 --poll-interval-ms 250
//! RELOADSERVE_TRIGGER=/tmp/my_trigger reloadserve
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ROOT: &str = "build/web";
pub const DEFAULT_TRIGGER: &str = "/tmp/reload_trigger";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_RELOAD_PATH: &str = "/livereload";

/// Serve a directory of built web assets and push reloads to open browser tabs.
#[derive(Debug, Clone, Parser)]
#[command(name = "reloadserve", version, about)]
pub struct Config {
    /// Address to listen on
    #[arg(long, default_value = DEFAULT_HOST, env = "RELOADSERVE_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "RELOADSERVE_PORT")]
    pub port: u16,

    /// Directory whose files are served
    #[arg(long, default_value = DEFAULT_ROOT, env = "RELOADSERVE_ROOT")]
    pub root: PathBuf,

    /// File whose modification time signals a finished build
    #[arg(long, default_value = DEFAULT_TRIGGER, env = "RELOADSERVE_TRIGGER")]
    pub trigger: PathBuf,

    /// Delay between two checks of the trigger file, in milliseconds
    #[arg(
        long = "poll-interval-ms",
        default_value_t = DEFAULT_POLL_INTERVAL_MS,
        value_parser = clap::value_parser!(u64).range(1..),
        env = "RELOADSERVE_POLL_INTERVAL_MS"
    )]
    pub poll_interval_ms: u64,

    /// Path of the Server-Sent Events endpoint
    #[arg(long, default_value = DEFAULT_RELOAD_PATH, env = "RELOADSERVE_RELOAD_PATH")]
    pub reload_path: String,

    /// Log connection and reload activity
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// `host:port`, ready for [`Server::bind`](crate::Server::bind).
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            root: PathBuf::from(DEFAULT_ROOT),
            trigger: PathBuf::from(DEFAULT_TRIGGER),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            reload_path: DEFAULT_RELOAD_PATH.to_string(),
            verbose: false,
        }
    }
}
