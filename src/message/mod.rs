//! Wire layouts of the records carried inside piggyback attributes.
//!
//! Only the header fields needed to walk concatenated records and to pull
//! out handshake message sequence numbers are parsed. Record payloads are
//! never interpreted beyond the handshake fragment headers of epoch 0.

mod ack;
mod handshake;
mod record;
mod util;

pub use ack::{parse_acks, serialize_acks};
pub use handshake::{HandshakeHeader, MessageType, HANDSHAKE_HEADER_LEN};
pub use record::{
    flags, ContentType, ProtocolVersion, RecordHeader, UnifiedHeader, RECORD_HEADER_LEN,
};

use crate::error::{ParseError, ParseErrorKind};

/// Map a nom failure while parsing `whole` to a [`ParseError`].
///
/// The position is where the unconsumed input started when the failing
/// parser gave up.
pub(crate) fn to_parse_error(
    whole: &[u8],
    err: nom::Err<nom::error::Error<&[u8]>>,
) -> ParseError {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = whole.len().saturating_sub(e.input.len());
            let kind = match e.code {
                nom::error::ErrorKind::Verify => ParseErrorKind::ConnectionIdUnsupported,
                _ => ParseErrorKind::Truncated,
            };
            ParseError::new(kind, position)
        }
        // Only complete parsers are used, but be total anyway.
        nom::Err::Incomplete(_) => ParseError::new(ParseErrorKind::Truncated, whole.len()),
    }
}
