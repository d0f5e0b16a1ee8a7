//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default location of the settings database.
pub const DEFAULT_STORE_PATH: &str = "download-relay.db";

/// Store path selecting a throwaway in-memory store.
pub const MEMORY_STORE: &str = ":memory:";

/// Redirect browser downloads to a JSON-RPC download manager.
///
/// Without a subcommand the relay serves a browser shim over stdin/stdout
/// using native-messaging framing. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "download-relay")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// SQLite file holding settings and history (":memory:" for a throwaway store)
    #[arg(long, default_value = DEFAULT_STORE_PATH, global = true)]
    pub store: PathBuf,

    /// Override the daemon endpoint (persisted)
    #[arg(short, long, global = true)]
    pub endpoint: Option<String>,

    /// RPC timeout in seconds (1-300)
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..=300), global = true)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the browser shim over stdin/stdout (default)
    Serve,
    /// Check whether the daemon is reachable (exit code 1 when offline)
    Check,
    /// Send URLs straight to the daemon
    Add {
        /// URLs to send
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Print the download history as JSON
    History,
    /// Clear the store and write default settings
    Reset,
}

impl Args {
    /// The subcommand to run.
    #[must_use]
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    /// True when the store should live in memory only.
    #[must_use]
    pub fn is_memory_store(&self) -> bool {
        self.store.as_os_str() == MEMORY_STORE
    }

    /// Default log filter. `RUST_LOG` takes priority over this.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
