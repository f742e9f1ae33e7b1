use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::data_log::DataLog;
use crate::error::AesdError;
use crate::pump::Boundary;

/// Byte counts for one finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub received: u64,
    pub sent: u64,
}

/// Serve one client: store its message, send back the whole log, close.
///
/// Any I/O failure is returned to the caller, which treats it as fatal.
pub async fn handle(
    mut stream: TcpStream,
    peer: SocketAddr,
    log: &mut DataLog,
    boundary: Boundary,
) -> Result<SessionSummary, AesdError> {
    let ip = peer.ip();
    let fail = |step: &'static str| move |source: std::io::Error| AesdError::Session {
        peer: ip,
        step,
        source,
    };

    stream
        .set_nodelay(true)
        .map_err(fail("configure the connection"))?;

    let received = log
        .append_from(&mut stream, boundary)
        .await
        .map_err(fail("receive into the data file"))?;

    let sent = log
        .replay_into(&mut stream)
        .await
        .map_err(fail("send the data file"))?;

    stream
        .shutdown()
        .await
        .map_err(fail("close the connection"))?;
    drop(stream);

    tracing::info!(peer = %ip, received, sent, "Closed connection from {ip}");
    Ok(SessionSummary { received, sent })
}
