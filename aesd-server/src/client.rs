use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread::sleep;
use std::time::Duration;

use crate::error::{io_err, AesdError};

/// Send one message and collect the server's reply until it closes.
pub fn exchange(addr: SocketAddr, payload: &[u8]) -> Result<Vec<u8>, AesdError> {
    let label = format!("tcp://{addr}");
    let mut stream = TcpStream::connect(addr).map_err(|err| {
        if matches!(
            err.kind(),
            ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
        ) {
            AesdError::ServerNotRunning { addr }
        } else {
            io_err(&label, err)
        }
    })?;

    stream.write_all(payload).map_err(|e| io_err(&label, e))?;
    stream.flush().map_err(|e| io_err(&label, e))?;

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .map_err(|e| io_err(&label, e))?;
    Ok(response)
}

/// [`exchange`], retrying while the server is not accepting yet.
pub fn exchange_with_retry(
    addr: SocketAddr,
    payload: &[u8],
    attempts: usize,
    delay: Duration,
) -> Result<Vec<u8>, AesdError> {
    let mut last_not_running: Option<AesdError> = None;
    for attempt in 0..attempts {
        match exchange(addr, payload) {
            Ok(response) => return Ok(response),
            Err(err @ AesdError::ServerNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt + 1 < attempts {
                    sleep(delay);
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or(AesdError::ServerNotRunning { addr }))
}
