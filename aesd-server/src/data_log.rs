//! The shared append-only data file.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{io_err, AesdError};
use crate::pump::{self, Boundary};

/// Append handle on the data file plus its path for replays.
///
/// Opened once at startup and lent to one session at a time.
#[derive(Debug)]
pub struct DataLog {
    path: PathBuf,
    file: File,
}

impl DataLog {
    /// Open (creating if needed) the data file in append mode.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AesdError> {
        let path = path.into();
        let file = open_append(&path).map_err(|e| io_err(&path, e))?;
        Ok(Self::from_std(path, file))
    }

    /// Wrap a handle opened before the async runtime existed.
    pub fn from_std(path: PathBuf, file: std::fs::File) -> Self {
        Self {
            path,
            file: File::from_std(file),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append everything `source` sends until `boundary`.
    pub async fn append_from<R>(&mut self, source: &mut R, boundary: Boundary) -> std::io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        pump::transfer(source, &mut self.file, boundary).await
    }

    /// Stream the whole file, from its first byte, into `destination`.
    pub async fn replay_into<W>(&self, destination: &mut W) -> std::io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut reader = File::open(&self.path).await?;
        pump::transfer(&mut reader, destination, Boundary::Eof).await
    }

    /// Close the handle and delete the file.
    pub async fn remove(self) -> Result<(), AesdError> {
        let Self { path, file } = self;
        drop(file.into_std().await);
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| io_err(&path, e))
    }
}

pub(crate) fn open_append(path: &Path) -> std::io::Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o644)
        .open(path)
}
