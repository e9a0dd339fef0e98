//! Stateless classification of record buffers.
//!
//! Every function here takes attacker controlled bytes. None of them index
//! past the end of the input; malformed input yields `false` or `Err`.

use nom::bytes::complete::take;

use crate::error::ParseError;
use crate::message::{
    flags, to_parse_error, ContentType, HandshakeHeader, MessageType, RecordHeader, UnifiedHeader,
    RECORD_HEADER_LEN,
};

type NomResult<'a, T> = Result<T, nom::Err<nom::error::Error<&'a [u8]>>>;

/// Offset of the handshake message type in a record carrying a handshake.
const FIRST_MSG_TYPE_OFFSET: usize = RECORD_HEADER_LEN;

/// Whether `buf` starts with something from the record layer family.
///
/// Content types 20..=23 are the classic record types, 32..=63 the unified
/// header. Anything outside (19, 64) is some other protocol sharing the
/// path, such as SRTP or STUN.
pub fn is_handshake_protocol_record(buf: &[u8]) -> bool {
    buf.len() >= RECORD_HEADER_LEN && buf[0] > 19 && buf[0] < 64
}

/// Whether `buf` starts with a plaintext ClientHello record.
pub fn is_first_flight_record(buf: &[u8]) -> bool {
    is_any_handshake_record(buf)
        && ContentType::from_u8(buf[0]) == ContentType::Handshake
        && MessageType::from_u8(buf[FIRST_MSG_TYPE_OFFSET]) == MessageType::ClientHello
}

/// Whether `buf` starts with a plaintext handshake record.
///
/// ChangeCipherSpec is accepted too, since a 1.2 peer closes its handshake
/// with one.
pub fn is_any_handshake_record(buf: &[u8]) -> bool {
    if buf.len() <= RECORD_HEADER_LEN + 4 || !is_handshake_protocol_record(buf) {
        return false;
    }
    matches!(
        ContentType::from_u8(buf[0]),
        ContentType::Handshake | ContentType::ChangeCipherSpec
    )
}

/// Collect the message sequence numbers of all epoch 0 handshake fragments
/// in a buffer of concatenated records.
///
/// Records with the unified header, records of other content types and
/// records in later epochs are skipped since their content is encrypted or
/// irrelevant. Any length field that runs past the buffer fails the whole
/// parse; no partial list is returned.
pub fn extract_handshake_message_sequence_numbers(buf: &[u8]) -> Result<Vec<u16>, ParseError> {
    let mut seqs = Vec::new();
    let mut input = buf;

    while !input.is_empty() {
        input = next_record(input, &mut seqs).map_err(|e| to_parse_error(buf, e))?;
    }

    Ok(seqs)
}

fn next_record<'a>(input: &'a [u8], seqs: &mut Vec<u16>) -> NomResult<'a, &'a [u8]> {
    if input.first().copied().is_some_and(flags::is_unified) {
        let (rest, header) = UnifiedHeader::parse(input)?;
        let rest = match header.length {
            Some(length) => take(length as usize)(rest)?.0,
            // Without a length the record runs to the end of the datagram.
            None => &rest[rest.len()..],
        };
        return Ok(rest);
    }

    let (rest, header) = RecordHeader::parse(input)?;
    let (rest, fragment) = take(header.length as usize)(rest)?;

    if header.content_type != ContentType::Handshake || header.epoch != 0 {
        return Ok(rest);
    }

    let mut body = fragment;
    while !body.is_empty() {
        let (after, handshake) = HandshakeHeader::parse(body)?;
        let (after, _) = take(handshake.fragment_length as usize)(after)?;
        seqs.push(handshake.message_seq);
        body = after;
    }

    Ok(rest)
}
