//! Append-and-replay TCP server: every client's bytes are appended to one
//! data file and the whole file is sent back before the connection closes.

pub mod client;
pub mod config;
pub mod daemon;
pub mod data_log;
mod error;
pub mod lifecycle;
pub mod paths;
pub mod pump;
pub mod server;
pub mod session;

pub use client::{exchange, exchange_with_retry};
pub use config::ServerConfig;
pub use data_log::DataLog;
pub use error::AesdError;
pub use lifecycle::{init_tracing, prepare, run, start_blocking, Exit, Prepared};
pub use pump::{transfer, Boundary, CHUNK_SIZE};
