//! aesdsocket — append-and-replay TCP server on port 9000.
//!
//! # Usage
//!
//! ```text
//! aesdsocket        # run in the foreground
//! aesdsocket -d     # detach into the background
//! ```
//!
//! Paths, port, and message boundary come from `AESD_*` environment
//! variables; see `aesd_server::paths`.

use anyhow::{Context, Result};
use clap::Parser;

use aesd_server::{start_blocking, Exit, ServerConfig};

#[derive(Parser, Debug)]
#[command(
    name = "aesdsocket",
    version,
    about = "Append every client message to a shared file and send the file back",
    long_about = None,
)]
struct Cli {
    /// Fork into the background after binding the port.
    #[arg(short = 'd', long = "daemon")]
    daemon: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::from_env().context("invalid server configuration")?;

    match start_blocking(config, cli.daemon).context("aesdsocket exited with error")? {
        Exit::Shutdown { sessions } => tracing::debug!(sessions, "clean shutdown"),
        Exit::Detached { child } => tracing::debug!(pid = %child, "parent exiting"),
    }
    Ok(())
}
