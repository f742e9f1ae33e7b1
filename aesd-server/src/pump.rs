//! Chunked byte pump between an async source and an async sink.
//!
//! A transfer reads at most [`CHUNK_SIZE`] bytes at a time and writes each
//! chunk out in full before reading again. Where the transfer stops is
//! decided by a [`Boundary`]:
//!
//! - [`Boundary::Eof`] stops only on a zero-length read.
//! - [`Boundary::Idle`] also stops when the source has nothing ready *after*
//!   at least one byte was moved. Before the first byte, "nothing ready"
//!   simply means waiting for readiness.
//! - [`Boundary::Newline`] stops after the chunk carrying a `\n`.

use std::fmt;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::str::FromStr;
use std::task::Poll;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

pub const CHUNK_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Boundary {
    Eof,
    #[default]
    Idle,
    Newline,
}

impl FromStr for Boundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eof" => Ok(Self::Eof),
            "idle" => Ok(Self::Idle),
            "newline" => Ok(Self::Newline),
            other => Err(format!(
                "unknown message boundary '{other}'; expected: eof, idle, newline"
            )),
        }
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eof => "eof",
            Self::Idle => "idle",
            Self::Newline => "newline",
        })
    }
}

/// Move bytes from `source` to `destination` until `boundary` says stop.
///
/// Returns the number of bytes moved. The destination is flushed before
/// returning. Errors other than "not ready yet" abort the transfer; bytes
/// already written stay written.
pub async fn transfer<R, W>(
    source: &mut R,
    destination: &mut W,
    boundary: Boundary,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = [0u8; CHUNK_SIZE];
    let mut moved: u64 = 0;

    loop {
        let stop_when_idle = boundary == Boundary::Idle && moved > 0;
        let read = match read_chunk(source, &mut buf, stop_when_idle).await? {
            Some(0) | None => break,
            Some(read) => read,
        };

        destination.write_all(&buf[..read]).await?;
        moved += read as u64;

        if boundary == Boundary::Newline && buf[..read].contains(&b'\n') {
            break;
        }
    }

    destination.flush().await?;
    Ok(moved)
}

/// Read one chunk. `Ok(None)` means the source went idle and the caller
/// asked to treat that as the end of the message.
async fn read_chunk<R>(
    source: &mut R,
    buf: &mut [u8],
    stop_when_idle: bool,
) -> io::Result<Option<usize>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    poll_fn(|cx| {
        let mut read_buf = ReadBuf::new(&mut *buf);
        match Pin::new(&mut *source).poll_read(cx, &mut read_buf) {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(Some(read_buf.filled().len()))),
            // EINTR never marks the end of a message.
            Poll::Ready(Err(err)) if err.kind() == io::ErrorKind::Interrupted => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Poll::Ready(Err(err)) if err.kind() == io::ErrorKind::WouldBlock => {
                if stop_when_idle {
                    Poll::Ready(Ok(None))
                } else {
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
            }
            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            Poll::Pending if stop_when_idle => Poll::Ready(Ok(None)),
            Poll::Pending => Poll::Pending,
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::task::Context;

    use tokio::io::{duplex, AsyncWriteExt};

    /// Sink that accepts at most `max_write` bytes per call and reports
    /// "not ready" on every other call.
    struct TrickleSink {
        data: Vec<u8>,
        max_write: usize,
        stall_next: bool,
        stalls: usize,
    }

    impl TrickleSink {
        fn new(max_write: usize) -> Self {
            Self {
                data: Vec::new(),
                max_write,
                stall_next: true,
                stalls: 0,
            }
        }
    }

    impl AsyncWrite for TrickleSink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.stall_next {
                self.stall_next = false;
                self.stalls += 1;
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
            self.stall_next = true;
            let n = buf.len().min(self.max_write);
            self.data.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[tokio::test]
    async fn eof_transfer_reproduces_input_across_chunk_edges() {
        for len in [0, 1, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 7 * CHUNK_SIZE + 13] {
            let input = pattern(len);
            let mut source: &[u8] = &input;
            let mut output = Vec::new();

            let moved = transfer(&mut source, &mut output, Boundary::Eof)
                .await
                .expect("transfer");

            assert_eq!(moved, len as u64, "byte count for len {len}");
            assert_eq!(output, input, "payload mismatch for len {len}");
        }
    }

    #[tokio::test]
    async fn idle_transfer_over_closed_stream_reads_everything() {
        let input = pattern(5 * CHUNK_SIZE);
        let (mut client, mut server) = duplex(8 * CHUNK_SIZE);
        client.write_all(&input).await.expect("write");
        drop(client);

        let mut output = Vec::new();
        transfer(&mut server, &mut output, Boundary::Idle)
            .await
            .expect("transfer");
        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn idle_boundary_ends_message_once_source_runs_dry() {
        let (mut client, mut server) = duplex(1024);
        client.write_all(b"first message").await.expect("write");

        let mut output = Vec::new();
        let moved = transfer(&mut server, &mut output, Boundary::Idle)
            .await
            .expect("transfer");

        assert_eq!(moved, 13);
        assert_eq!(output, b"first message");

        // The peer is still open; a later message is a separate transfer.
        client.write_all(b"second").await.expect("write");
        let mut next = Vec::new();
        transfer(&mut server, &mut next, Boundary::Idle)
            .await
            .expect("transfer");
        assert_eq!(next, b"second");
    }

    #[tokio::test]
    async fn idle_boundary_waits_for_the_first_byte() {
        let (mut client, mut server) = duplex(1024);

        let pump = tokio::spawn(async move {
            let mut output = Vec::new();
            transfer(&mut server, &mut output, Boundary::Idle)
                .await
                .map(|_| output)
        });

        tokio::task::yield_now().await;
        assert!(!pump.is_finished(), "pump must not finish before any data");

        client.write_all(b"late").await.expect("write");
        let output = pump.await.expect("join").expect("transfer");
        assert_eq!(output, b"late");
    }

    #[tokio::test]
    async fn newline_boundary_stops_after_terminated_chunk() {
        let (mut client, mut server) = duplex(1024);
        client.write_all(b"line one\n").await.expect("write");

        let mut output = Vec::new();
        transfer(&mut server, &mut output, Boundary::Newline)
            .await
            .expect("transfer");
        assert_eq!(output, b"line one\n");
    }

    #[tokio::test]
    async fn partial_and_stalled_writes_are_completed() {
        let input = pattern(3 * CHUNK_SIZE + 5);
        let mut source: &[u8] = &input;
        let mut sink = TrickleSink::new(7);

        transfer(&mut source, &mut sink, Boundary::Eof)
            .await
            .expect("transfer");

        assert_eq!(sink.data, input);
        assert!(sink.stalls > 0, "sink should have reported not-ready");
    }

    #[tokio::test]
    async fn read_errors_abort_after_keeping_written_bytes() {
        let mut source = tokio_test::io::Builder::new()
            .read(b"kept")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "peer reset"))
            .build();
        let mut output = Vec::new();

        let err = transfer(&mut source, &mut output, Boundary::Eof)
            .await
            .expect_err("error must propagate");

        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(output, b"kept");
    }

    #[tokio::test]
    async fn interrupted_reads_are_retried_under_idle_boundary() {
        let mut source = tokio_test::io::Builder::new()
            .read_error(io::Error::new(io::ErrorKind::Interrupted, "EINTR"))
            .read(b"ab")
            .read_error(io::Error::new(io::ErrorKind::Interrupted, "EINTR"))
            .read(b"cd")
            .build();
        let mut output = Vec::new();

        let moved = transfer(&mut source, &mut output, Boundary::Idle)
            .await
            .expect("EINTR is not an error");

        assert_eq!(moved, 4);
        assert_eq!(output, b"abcd");
    }

    #[tokio::test]
    async fn mock_reads_are_concatenated_in_order() {
        let mut source = tokio_test::io::Builder::new()
            .read(b"hello")
            .read(b"world")
            .build();
        let mut output = Vec::new();

        transfer(&mut source, &mut output, Boundary::Eof)
            .await
            .expect("transfer");
        assert_eq!(output, b"helloworld");
    }

    #[test]
    fn boundary_parses_case_insensitively() {
        assert_eq!("IDLE".parse::<Boundary>(), Ok(Boundary::Idle));
        assert_eq!("newline".parse::<Boundary>(), Ok(Boundary::Newline));
        assert_eq!(" eof ".parse::<Boundary>(), Ok(Boundary::Eof));
        assert!("length".parse::<Boundary>().is_err());
        assert_eq!(Boundary::Newline.to_string(), "newline");
    }
}
