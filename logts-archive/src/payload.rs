//! Fixed-length payload reader for tar entries.

use std::io::{self, Read};

/// A reader that yields exactly `expected` bytes.
///
/// A tar header announces the payload size up front, so whatever happens to
/// the source file after the header is written, exactly that many bytes must
/// follow. Bytes past `expected` are never read. If the source ends early or
/// fails, the remainder is filled with zeros and the failure is kept for the
/// caller instead of being returned from `read`.
pub struct PayloadReader<R> {
    inner: R,
    remaining: u64,
    copied: u64,
    padded: u64,
    error: Option<io::Error>,
    exhausted: bool,
}

/// What happened while a payload was streamed.
#[derive(Debug)]
pub struct PayloadOutcome {
    /// Bytes taken from the source file.
    pub copied: u64,
    /// Zero bytes written in place of missing source data.
    pub padded: u64,
    /// The read error that cut the copy short, if any.
    pub error: Option<io::Error>,
}

impl<R> PayloadReader<R> {
    pub fn new(inner: R, expected: u64) -> Self {
        Self {
            inner,
            remaining: expected,
            copied: 0,
            padded: 0,
            error: None,
            exhausted: false,
        }
    }

    /// Consume the reader, dropping the source, and report how the copy went.
    pub fn finish(self) -> PayloadOutcome {
        PayloadOutcome {
            copied: self.copied,
            padded: self.padded,
            error: self.error,
        }
    }
}

impl<R: Read> Read for PayloadReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));

        if !self.exhausted && self.error.is_none() {
            match self.inner.read(&mut buf[..max]) {
                Ok(0) => self.exhausted = true,
                Ok(n) => {
                    self.remaining -= n as u64;
                    self.copied += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => return Err(e),
                Err(e) => self.error = Some(e),
            }
        }

        buf[..max].fill(0);
        self.remaining -= max as u64;
        self.padded += max as u64;
        Ok(max)
    }
}
