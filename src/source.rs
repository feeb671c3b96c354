// src/source.rs
//! Tail of the producer's append-only JSON-lines file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::SourceError;

/// Remembers how far into the file it has read and hands out only
/// newly appended, newline-terminated lines.
#[derive(Debug)]
pub struct LineSource {
    path: PathBuf,
    offset: u64,
}

impl LineSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Lines appended since the previous poll, in file order.
    ///
    /// A trailing line without `\n` is left for the next poll. If the file
    /// shrank below the saved offset it was rotated and is read from the start.
    /// Only the length is compared: a file replaced and regrown past the saved
    /// offset between two polls is read from that offset, and its earlier
    /// lines are never seen.
    pub fn poll(&mut self) -> Result<Vec<String>, SourceError> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SourceError::Unavailable(self.path.clone()));
            }
            Err(e) => return Err(self.io_err(e)),
        };

        let meta = file.metadata().map_err(|e| self.io_err(e))?;
        if !meta.is_file() {
            return Err(self.io_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }
        let len = meta.len();
        if len < self.offset {
            tracing::info!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = len,
                "input file shrank; re-reading from start"
            );
            self.offset = 0;
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset))
            .map_err(|e| self.io_err(e))?;
        let mut buf = Vec::with_capacity((len - self.offset) as usize);
        file.read_to_end(&mut buf).map_err(|e| self.io_err(e))?;

        let complete = match buf.iter().rposition(|&b| b == b'\n') {
            Some(i) => i + 1,
            None => return Ok(Vec::new()),
        };
        self.offset += complete as u64;

        Ok(buf[..complete]
            .split(|&b| b == b'\n')
            .map(|l| String::from_utf8_lossy(l).trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    fn io_err(&self, source: io::Error) -> SourceError {
        SourceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
