use std::fmt;

use thiserror::Error;

/// Errors produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// The handshake engine rejected injected bytes.
    #[error("Engine error: {0}")]
    EngineError(String),
}

/// What went wrong while walking a buffer of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A header or length field reads past the end of the buffer.
    Truncated,
    /// Unified header with the connection id bit set.
    ConnectionIdUnsupported,
}

/// Failure to parse a buffer of concatenated records.
///
/// `position` is the byte offset into the inspected buffer where the
/// offending record, or field, starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    position: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, position: usize) -> Self {
        ParseError { kind, position }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at position {}: {:?}",
            self.position, self.kind
        )
    }
}

impl std::error::Error for ParseError {}
