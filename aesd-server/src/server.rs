use std::io::ErrorKind;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::data_log::DataLog;
use crate::error::AesdError;
use crate::pump::Boundary;
use crate::session;

pub type ShutdownTx = broadcast::Sender<()>;
pub type ShutdownRx = broadcast::Receiver<()>;

/// Create the shutdown channel shared by the signal task and the loop.
pub fn shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    broadcast::channel::<()>(16)
}

/// Accept and serve connections one at a time until shutdown is requested.
///
/// Returns the number of completed sessions. A failed session or a
/// non-transient accept error ends the loop with that error; the caller
/// owns cleanup in every case.
pub async fn serve(
    listener: &TcpListener,
    log: &mut DataLog,
    boundary: Boundary,
    shutdown_rx: &mut ShutdownRx,
) -> Result<u64, AesdError> {
    let mut sessions = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) if is_transient(err.kind()) => {
                        tracing::debug!(error = %err, "transient accept failure, retrying");
                        continue;
                    }
                    Err(err) => return Err(AesdError::Accept(err)),
                };

                tracing::info!(peer = %peer.ip(), "Accepted connection from {}", peer.ip());
                session::handle(stream, peer, log, boundary).await?;
                sessions += 1;
            }
        }
    }

    Ok(sessions)
}

fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::WouldBlock
            | ErrorKind::Interrupted
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
    )
}
