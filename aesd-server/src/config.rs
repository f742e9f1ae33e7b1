//! Server configuration resolved from the environment.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AesdError;
use crate::paths::{
    daemon_log_path, data_file_path, pid_file_path, BOUNDARY_ENV, DEFAULT_PORT, LISTEN_BACKLOG,
    PORT_ENV,
};
use crate::pump::Boundary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub backlog: i32,
    pub data_file: PathBuf,
    pub pid_file: PathBuf,
    pub daemon_log: PathBuf,
    /// How the end of a client message is detected on the socket.
    pub boundary: Boundary,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            backlog: LISTEN_BACKLOG,
            data_file: PathBuf::from(crate::paths::DATA_FILE),
            pid_file: PathBuf::from(crate::paths::PID_FILE),
            daemon_log: PathBuf::from(crate::paths::DAEMON_LOG),
            boundary: Boundary::Idle,
        }
    }
}

impl ServerConfig {
    /// Build the configuration from defaults plus `AESD_*` overrides.
    pub fn from_env() -> Result<Self, AesdError> {
        let port = match env_value(PORT_ENV) {
            Some(raw) => parse_port(&raw)?,
            None => DEFAULT_PORT,
        };
        let boundary = match env_value(BOUNDARY_ENV) {
            Some(raw) => Boundary::from_str(&raw).map_err(|_| AesdError::Config {
                key: BOUNDARY_ENV,
                value: raw,
            })?,
            None => Boundary::Idle,
        };

        Ok(Self {
            port,
            backlog: LISTEN_BACKLOG,
            data_file: data_file_path(),
            pid_file: pid_file_path(),
            daemon_log: daemon_log_path(),
            boundary,
        })
    }

    /// All IPv4 interfaces on the configured port.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.port))
    }
}

fn parse_port(raw: &str) -> Result<u16, AesdError> {
    raw.trim().parse::<u16>().map_err(|_| AesdError::Config {
        key: PORT_ENV,
        value: raw.to_string(),
    })
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
