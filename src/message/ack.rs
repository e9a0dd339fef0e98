//! Ack attribute payload.
//!
//! A bare list of big-endian 16-bit handshake message sequence numbers,
//! no length prefix. An empty list is a valid, meaningful payload.

use nom::multi::many0;
use nom::number::complete::be_u16;

use crate::error::{ParseError, ParseErrorKind};

pub fn serialize_acks(seqs: &[u16]) -> Vec<u8> {
    let mut output = Vec::with_capacity(seqs.len() * 2);
    for seq in seqs {
        output.extend_from_slice(&seq.to_be_bytes());
    }
    output
}

pub fn parse_acks(input: &[u8]) -> Result<Vec<u16>, ParseError> {
    if input.len() % 2 != 0 {
        return Err(ParseError::new(ParseErrorKind::Truncated, input.len() - 1));
    }

    let (_, seqs) = many0(be_u16::<_, nom::error::Error<&[u8]>>)(input)
        .map_err(|e| super::to_parse_error(input, e))?;

    Ok(seqs)
}
