use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 9000;
pub const LISTEN_BACKLOG: i32 = 16;

pub const DATA_FILE: &str = "/var/tmp/aesdsocketdata";
pub const PID_FILE: &str = "/var/tmp/aesdsocket.pid";
pub const DAEMON_LOG: &str = "/var/tmp/aesdsocket.log";

pub const PORT_ENV: &str = "AESD_PORT";
pub const DATA_FILE_ENV: &str = "AESD_DATA_FILE";
pub const PID_FILE_ENV: &str = "AESD_PID_FILE";
pub const DAEMON_LOG_ENV: &str = "AESD_DAEMON_LOG";
pub const BOUNDARY_ENV: &str = "AESD_BOUNDARY";

pub fn data_file_path() -> PathBuf {
    env_path(DATA_FILE_ENV, DATA_FILE)
}

pub fn pid_file_path() -> PathBuf {
    env_path(PID_FILE_ENV, PID_FILE)
}

pub fn daemon_log_path() -> PathBuf {
    env_path(DAEMON_LOG_ENV, DAEMON_LOG)
}

fn env_path(key: &str, default: &str) -> PathBuf {
    match std::env::var_os(key) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(default),
    }
}
