//! IMAP error types.

use std::io::Error as IoError;
use std::result;
use std::string::FromUtf8Error;

use thiserror::Error;

/// A convenience wrapper around `Result` for `imap_client::Error`.
pub type Result<T> = result::Result<T, Error>;

/// Completion status of a command, as the server (or the client) classified it.
///
/// The discriminants are stable: `Ok` is zero and every failure kind is a distinct negative
/// number, so callers can compare against [`Status::Ok`] instead of matching strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum Status {
    /// The tagged response was `OK`.
    Ok = 0,
    /// The server refused the command (`NO`).
    No = -1,
    /// The server could not parse the command (`BAD`).
    Bad = -2,
    /// The server is closing the connection (`BYE`).
    Bye = -3,
    /// The completion line could not be classified.
    Unknown = -4,
    /// The client failed to send the command, or the continuation protocol was violated.
    Command = -5,
    /// A mutation was attempted on a mailbox that is not opened read-write.
    Readonly = -6,
}

impl Status {
    /// The numeric code of this status.
    pub fn code(self) -> i8 {
        self as i8
    }

    /// Returns true for [`Status::Ok`].
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    pub(crate) fn from_word(word: &str) -> Option<Status> {
        match word.to_ascii_uppercase().as_str() {
            "OK" => Some(Status::Ok),
            "NO" => Some(Status::No),
            "BAD" => Some(Status::Bad),
            "BYE" => Some(Status::Bye),
            _ => None,
        }
    }
}

/// A set of errors that can occur in the IMAP client
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An `io::Error` that occurred while trying to read or write to a network stream.
    #[error(transparent)]
    Io(#[from] IoError),
    /// The TLS handshake with the server failed.
    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),
    /// An error from the `native_tls` library while managing the socket.
    #[cfg(feature = "native-tls")]
    #[error(transparent)]
    Tls(#[from] native_tls::Error),
    /// A BAD response from the IMAP server.
    #[error("{0}")]
    Bad(String),
    /// A NO response from the IMAP server.
    #[error("{0}")]
    No(String),
    /// The server said BYE; the connection has been closed.
    #[error("{0}")]
    Bye(String),
    /// The server's completion line could not be classified.
    #[error("{0}")]
    Unknown(String),
    /// The command could not be sent, or the server rejected a literal continuation.
    #[error("{0}")]
    Command(String),
    /// The selected mailbox is read-only.
    #[error("{0}")]
    Readonly(String),
    /// The client was configured with unusable parameters.
    #[error("{0}")]
    Config(String),
    /// The connection was terminated unexpectedly.
    #[error("Connection lost")]
    ConnectionLost,
    /// Error parsing a server response.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Error validating input data
    #[error(transparent)]
    Validate(#[from] ValidateError),
}

impl Error {
    /// Map this error onto the command status taxonomy.
    pub fn status(&self) -> Status {
        match self {
            Error::Bad(_) | Error::Config(_) => Status::Bad,
            Error::No(_) => Status::No,
            Error::Bye(_) => Status::Bye,
            Error::Unknown(_) => Status::Unknown,
            Error::Readonly(_) => Status::Readonly,
            _ => Status::Command,
        }
    }

    pub(crate) fn from_status(status: Status, message: String) -> Error {
        match status {
            Status::No => Error::No(message),
            Status::Bad => Error::Bad(message),
            Status::Bye => Error::Bye(message),
            Status::Readonly => Error::Readonly(message),
            Status::Command => Error::Command(message),
            Status::Ok | Status::Unknown => Error::Unknown(message),
        }
    }
}

impl<T> From<bufstream::IntoInnerError<T>> for Error {
    fn from(err: bufstream::IntoInnerError<T>) -> Error {
        Error::Io(err.into())
    }
}

/// An error occured while trying to parse a server response.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A literal `{n}` announced a byte count that could not be read.
    #[error("Malformed literal: {0}")]
    Literal(String),
    /// A quoted string was not terminated.
    #[error("Unterminated quoted string")]
    Unterminated,
    /// A parenthesized list was not closed.
    #[error("Unbalanced parentheses")]
    Unbalanced,
    /// A response carried a token of the wrong shape.
    #[error("Unexpected response: {0}")]
    Unexpected(String),
    /// A message set contained something other than `0-9`, `:`, `,` or `*`.
    #[error("Invalid message set: {0}")]
    MessageSet(String),
    /// The client tried to interpret some input as UTF-8 but failed.
    #[error(transparent)]
    DataNotUtf8(#[from] FromUtf8Error),
}

/// An [invalid character](https://tools.ietf.org/html/rfc3501#section-4.3) was found in an input
/// string.
#[derive(Debug, Error)]
#[error("Invalid character in input: {0:?}")]
pub struct ValidateError(pub char);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_distinct_and_negative() {
        let all = [
            Status::No,
            Status::Bad,
            Status::Bye,
            Status::Unknown,
            Status::Command,
            Status::Readonly,
        ];
        assert_eq!(Status::Ok.code(), 0);
        for (i, a) in all.iter().enumerate() {
            assert!(a.code() < 0);
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn error_maps_to_status() {
        assert_eq!(Error::No("x".into()).status(), Status::No);
        assert_eq!(Error::Config("x".into()).status(), Status::Bad);
        assert_eq!(Error::ConnectionLost.status(), Status::Command);
        assert_eq!(Error::Readonly("x".into()).status(), Status::Readonly);
    }

    #[test]
    fn validate_error_shows_char() {
        let e = ValidateError('\n');
        assert_eq!(e.to_string(), "Invalid character in input: '\\n'");
    }
}
