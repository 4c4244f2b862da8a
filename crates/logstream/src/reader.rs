// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Offset-tracked incremental reads of the log file.
//!
//! The reader remembers how many bytes of the file have been consumed and,
//! on every call, reads only what was appended since. The offset only moves
//! past complete (newline-terminated) records: an unterminated tail is left
//! in place and picked up once the writer finishes the line.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::warn;

/// Where tailing begins when a session starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartPosition {
    /// Ship everything already in the file on the first modification.
    #[default]
    Beginning,
    /// Ship only what is appended after the session starts.
    End,
}

/// Reads a log file incrementally, remembering how far it got.
#[derive(Debug)]
pub struct TailReader {
    path: PathBuf,
    offset: u64,
}

impl TailReader {
    /// Opens `path` for tailing.
    ///
    /// Fails if the file does not exist or cannot be read. The stored path is
    /// canonicalized so it compares equal to paths reported by the watcher.
    pub fn open(path: &Path, start_position: StartPosition) -> io::Result<Self> {
        let path = path.canonicalize()?;
        let file = File::open(&path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "log path is not a regular file",
            ));
        }

        let offset = match start_position {
            StartPosition::Beginning => 0,
            StartPosition::End => metadata.len(),
        };

        Ok(Self { path, offset })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the non-empty, trimmed lines appended since the last call.
    pub fn read_new_lines(&mut self) -> io::Result<Vec<String>> {
        let mut file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();

        if file_len < self.offset {
            warn!(
                "LOGSTREAM | {} shrank from {} to {} bytes, reading from the start",
                self.path.display(),
                self.offset,
                file_len
            );
            self.offset = 0;
        }
        if file_len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut bytes = Vec::with_capacity(usize::try_from(file_len - self.offset).unwrap_or(0));
        file.read_to_end(&mut bytes)?;

        let (lines, consumed) = split_complete_lines(&bytes);
        self.offset += consumed as u64;
        Ok(lines)
    }
}

/// Splits `bytes` on `\n`, ignoring any unterminated tail.
///
/// Returns the trimmed non-empty lines and the number of bytes they span,
/// terminators included.
fn split_complete_lines(bytes: &[u8]) -> (Vec<String>, usize) {
    let Some(last_newline) = bytes.iter().rposition(|&b| b == b'\n') else {
        return (Vec::new(), 0);
    };

    let complete = &bytes[..last_newline];
    let lines = complete
        .split(|&b| b == b'\n')
        .map(String::from_utf8_lossy)
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    (lines, last_newline + 1)
}
