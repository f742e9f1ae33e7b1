//! Detaching the server into a background process.

use std::fs;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use nix::unistd::{self, ForkResult, Pid};

use crate::error::{io_err, AesdError};

/// Which side of the fork the caller is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detached {
    /// The invoking process; it should exit with success right away.
    Parent { child: Pid },
    /// The background process, now owning every inherited descriptor.
    Child { pid_file: PathBuf },
}

/// Fork once, then turn the child into a session leader with stdio on
/// `/dev/null`. The child is handed `pid_file` to write once it can be
/// signalled.
///
/// Must be called before any async runtime or other thread exists.
pub fn daemonize(pid_file: &Path) -> Result<Detached, AesdError> {
    // SAFETY: the process is still single-threaded here; the tokio runtime
    // is only built after this returns in the child.
    let forked = unsafe { unistd::fork() }.map_err(|source| AesdError::Daemonize {
        step: "fork",
        source,
    })?;

    match forked {
        ForkResult::Parent { child } => Ok(Detached::Parent { child }),
        ForkResult::Child => {
            unistd::setsid().map_err(|source| AesdError::Daemonize {
                step: "setsid",
                source,
            })?;
            redirect_stdio()?;
            Ok(Detached::Child {
                pid_file: pid_file.to_path_buf(),
            })
        }
    }
}

fn redirect_stdio() -> Result<(), AesdError> {
    let devnull = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .map_err(|e| io_err("/dev/null", e))?;
    let fd = devnull.as_raw_fd();
    for target in 0..=2 {
        unistd::dup2(fd, target).map_err(|source| AesdError::Daemonize {
            step: "redirect stdio",
            source,
        })?;
    }
    Ok(())
}

pub fn write_pid_file(path: &Path, pid: Pid) -> Result<(), AesdError> {
    fs::write(path, format!("{pid}\n")).map_err(|e| io_err(path, e))
}

/// Read a pid written by [`write_pid_file`].
pub fn read_pid_file(path: &Path) -> Result<Option<Pid>, AesdError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    Ok(raw.trim().parse::<i32>().ok().map(Pid::from_raw))
}
