//! aesd-writer — write a string to a file, replacing its contents.
//!
//! ```text
//! aesd-writer <file> <string>
//! ```

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "aesd-writer", version, about = "Write a string to a file")]
struct Cli {
    /// File to create or truncate.
    file: PathBuf,
    /// Text written verbatim, without a trailing newline.
    text: String,
}

fn main() -> ExitCode {
    aesd_server::init_tracing(None);

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            tracing::error!("invalid number of command-line arguments");
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };

    match write_text(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "write failed");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn write_text(cli: &Cli) -> Result<()> {
    tracing::debug!(file = %cli.file.display(), "Writing {:?} to {}", cli.text, cli.file.display());
    let mut file = File::create(&cli.file)
        .with_context(|| format!("failed to open the file '{}'", cli.file.display()))?;
    file.write_all(cli.text.as_bytes()).with_context(|| {
        format!(
            "failed to write the string '{}' to the file '{}'",
            cli.text,
            cli.file.display()
        )
    })?;
    file.flush()
        .with_context(|| format!("failed to close the file '{}'", cli.file.display()))?;
    Ok(())
}
