use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

/// Error surface for server setup, sessions, and daemonization.
#[derive(Debug, Error)]
pub enum AesdError {
    #[error("failed to {step}: {source}")]
    Setup {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session with {peer} failed to {step}: {source}")]
    Session {
        peer: IpAddr,
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    #[error("daemonization failed during {step}: {source}")]
    Daemonize {
        step: &'static str,
        #[source]
        source: nix::Error,
    },

    #[error("server is not accepting connections at {addr}")]
    ServerNotRunning { addr: SocketAddr },

    #[error("invalid configuration value for {key}: {value:?}")]
    Config { key: &'static str, value: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> AesdError {
    AesdError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn setup_err(step: &'static str) -> impl FnOnce(std::io::Error) -> AesdError {
    move |source| AesdError::Setup { step, source }
}
