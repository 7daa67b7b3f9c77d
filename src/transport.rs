//! Buffered line and literal I/O over the connection stream.

use std::io::{self, BufRead, Read, Write};

use bufstream::BufStream;
use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::error::{Error, Result};

pub(crate) const CR: u8 = 0x0d;
pub(crate) const LF: u8 = 0x0a;

/// Longest chunk of a wire line written to the debug log.
pub(crate) const DEBUG_LINE_LENGTH: usize = 4098;

lazy_static! {
    static ref LITERAL_AT_EOL: Regex = Regex::new(r"\{([0-9]+)\}\r\n$").unwrap();
    static ref COMMAND_PREFIX: Regex = Regex::new(r"^(A\d+ (?:[A-Z]+ )+)(.+)").unwrap();
}

/// The byte stream underneath a [`Client`](crate::client::Client).
///
/// Once a read hits EOF or fails, or a write fails, the stream is dropped and every later
/// operation fails with [`Error::ConnectionLost`].
#[derive(Debug)]
pub struct Transport<T: Read + Write> {
    stream: Option<BufStream<T>>,
    pub(crate) debug: bool,
}

impl<T: Read + Write> Transport<T> {
    pub(crate) fn new(stream: T) -> Self {
        Transport {
            stream: Some(BufStream::new(stream)),
            debug: false,
        }
    }

    /// Returns true until the stream has been closed.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Borrow the underlying stream, if it is still open.
    pub fn get_ref(&self) -> Option<&T> {
        self.stream.as_ref().map(|s| s.get_ref())
    }

    /// Mutably borrow the underlying stream, if it is still open.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.stream.as_mut().map(|s| s.get_mut())
    }

    pub(crate) fn into_inner(mut self) -> Result<T> {
        match self.stream.take() {
            Some(s) => Ok(s.into_inner()?),
            None => Err(Error::ConnectionLost),
        }
    }

    /// Drop the stream, closing the underlying descriptor.
    pub(crate) fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("connection closed");
        }
    }

    fn stream(&mut self) -> Result<&mut BufStream<T>> {
        self.stream.as_mut().ok_or(Error::ConnectionLost)
    }

    fn fail(&mut self, err: io::Error) -> Error {
        tracing::warn!(error = %err, "connection error, closing");
        self.close();
        Error::Io(err)
    }

    /// Append one line, including its CRLF, to `into`.
    pub(crate) fn read_line(&mut self, into: &mut Vec<u8>) -> Result<usize> {
        let start = into.len();
        let read = match self.stream()?.read_until(LF, into) {
            Ok(n) => n,
            Err(e) => return Err(self.fail(e)),
        };
        if read == 0 {
            self.close();
            return Err(Error::ConnectionLost);
        }
        if self.debug {
            log_received(&into[start..]);
        }
        Ok(read)
    }

    /// Append exactly `n` bytes to `into`.
    pub(crate) fn read_exact(&mut self, n: usize, into: &mut Vec<u8>) -> Result<()> {
        let start = into.len();
        into.resize(start + n, 0);
        if let Err(e) = self.stream()?.read_exact(&mut into[start..]) {
            into.truncate(start);
            if e.kind() == io::ErrorKind::UnexpectedEof {
                self.close();
                return Err(Error::ConnectionLost);
            }
            return Err(self.fail(e));
        }
        if self.debug {
            log_received(&into[start..]);
        }
        Ok(())
    }

    /// Read one logical response line: every `{n}` literal announced at the end of a physical
    /// line is read byte-exact, followed by the rest of the line.
    pub(crate) fn read_full_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        self.read_line(&mut line)?;
        while let Some(n) = trailing_literal(&line) {
            self.read_exact(n, &mut line)?;
            self.read_line(&mut line)?;
        }
        Ok(line)
    }

    /// Write `data` without a terminator. `redact` hides the payload from the debug log.
    pub(crate) fn send(&mut self, data: &[u8], redact: bool) -> Result<()> {
        if self.debug {
            log_sent(data, redact);
        }
        if let Err(e) = self.stream()?.write_all(data) {
            return Err(self.fail(e));
        }
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        if let Err(e) = self.stream()?.flush() {
            return Err(self.fail(e));
        }
        Ok(())
    }

    /// Write `data` followed by CRLF and flush.
    pub(crate) fn write_line(&mut self, data: &[u8], redact: bool) -> Result<()> {
        let mut buf = Vec::with_capacity(data.len() + 2);
        buf.extend_from_slice(data);
        buf.extend_from_slice(&[CR, LF]);
        self.send(&buf, redact)?;
        self.flush()
    }
}

/// The byte count of a literal announced at the very end of `line`.
pub(crate) fn trailing_literal(line: &[u8]) -> Option<usize> {
    LITERAL_AT_EOL
        .captures(line)
        .and_then(|c| std::str::from_utf8(&c[1]).ok()?.parse().ok())
}

fn truncate_for_log(data: &[u8]) -> String {
    let trimmed = trim_crlf(data);
    if trimmed.len() > DEBUG_LINE_LENGTH {
        format!(
            "{}... [{} bytes]",
            String::from_utf8_lossy(&trimmed[..DEBUG_LINE_LENGTH]),
            trimmed.len()
        )
    } else {
        String::from_utf8_lossy(trimmed).into_owned()
    }
}

fn log_received(data: &[u8]) {
    tracing::debug!("S: {}", truncate_for_log(data));
}

fn log_sent(data: &[u8], redact: bool) {
    if !redact {
        tracing::debug!("C: {}", truncate_for_log(data));
        return;
    }
    let data = trim_crlf(data);
    match COMMAND_PREFIX.captures(data) {
        Some(m) => tracing::debug!(
            "C: {}****** [{}]",
            String::from_utf8_lossy(&m[1]),
            m[2].len()
        ),
        None => tracing::debug!("C: ****** [{}]", data.len()),
    }
}

pub(crate) fn trim_crlf(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    while end > 0 && (data[end - 1] == LF || data[end - 1] == CR) {
        end -= 1;
    }
    &data[..end]
}
