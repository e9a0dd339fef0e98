//! Record headers.
//!
//! ## Legacy header (13 bytes)
//! ```text
//!  struct {
//!      ContentType type;
//!      ProtocolVersion version;
//!      uint16 epoch;
//!      uint48 sequence_number;
//!      uint16 length;
//!  } DTLSPlaintext;
//! ```
//!
//! ## Unified header (encrypted short header)
//! ```text
//!  0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+
//! |0|0|1|C|S|L|E E|  C=CID | S=SeqNo width | L=Length present | E=Epoch bits
//! +-+-+-+-+-+-+-+-+
//! | 8 or 16 bit   |
//! |Sequence Number|
//! +-+-+-+-+-+-+-+-+
//! | 16 bit Length |  if L=1
//! +-+-+-+-+-+-+-+-+
//! ```

use std::fmt;

use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use super::util::be_u48;

/// Length of the legacy record header.
pub const RECORD_HEADER_LEN: usize = 13;

/// Unified header flags
pub mod flags {
    /// Fixed header bits (001xxxxx)
    pub const FIXED_BITS: u8 = 0b0010_0000;
    /// Mask for fixed bits
    pub const FIXED_MASK: u8 = 0b1110_0000;
    /// Connection ID present
    pub const CID_BIT: u8 = 0b0001_0000;
    /// Sequence number is 16-bit (vs 8-bit)
    pub const SEQ_16BIT: u8 = 0b0000_1000;
    /// Length field present
    pub const LENGTH_BIT: u8 = 0b0000_0100;

    /// Whether the first byte of a record selects the unified header.
    pub fn is_unified(first: u8) -> bool {
        first & FIXED_MASK == FIXED_BITS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Unknown(u8),
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

/// Record layer protocol version.
///
/// Also used to describe which handshake version completed, since the
/// flight that is sent last differs between 1.2 and 1.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    DTLS1_0,
    DTLS1_2,
    DTLS1_3,
    Unknown(u16),
}

impl ProtocolVersion {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0xFEFF => ProtocolVersion::DTLS1_0,
            0xFEFD => ProtocolVersion::DTLS1_2,
            0xFEFC => ProtocolVersion::DTLS1_3,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, version) = be_u16(input)?;
        Ok((input, Self::from_u16(version)))
    }

    /// Whether the client, rather than the server, sends the last flight.
    ///
    /// In a full 1.2 handshake the server's ChangeCipherSpec/Finished closes
    /// the exchange. In 1.3 the client's Finished does.
    pub fn swaps_last_flight(&self) -> bool {
        matches!(self, ProtocolVersion::DTLS1_3)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::DTLS1_0 => write!(f, "DTLS 1.0"),
            ProtocolVersion::DTLS1_2 => write!(f, "DTLS 1.2"),
            ProtocolVersion::DTLS1_3 => write!(f, "DTLS 1.3"),
            ProtocolVersion::Unknown(v) => write!(f, "Unknown({:#06x})", v),
        }
    }
}

/// Legacy record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub epoch: u16,
    pub sequence_number: u64,
    pub length: u16,
}

impl RecordHeader {
    pub fn parse(input: &[u8]) -> IResult<&[u8], RecordHeader> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, epoch) = be_u16(input)?;
        let (input, sequence_number) = be_u48(input)?;
        let (input, length) = be_u16(input)?;

        Ok((
            input,
            RecordHeader {
                content_type,
                version,
                epoch,
                sequence_number,
                length,
            },
        ))
    }
}

/// Unified (encrypted short) header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnifiedHeader {
    /// `None` when the record runs to the end of the datagram.
    pub length: Option<u16>,
}

impl UnifiedHeader {
    /// Parse a unified header.
    ///
    /// Fails with `ErrorKind::Tag` when the fixed bits are wrong and with
    /// `ErrorKind::Verify` when a connection id is signalled.
    pub fn parse(input: &[u8]) -> IResult<&[u8], UnifiedHeader> {
        let (rest, header_byte) = be_u8(input)?;

        if !flags::is_unified(header_byte) {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }

        // Connection IDs are not supported
        if header_byte & flags::CID_BIT != 0 {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Verify,
            )));
        }

        let seq_len: usize = if header_byte & flags::SEQ_16BIT != 0 {
            2
        } else {
            1
        };
        let has_length = header_byte & flags::LENGTH_BIT != 0;

        // Sequence number bits are encrypted, skip them.
        let (rest, _) = take(seq_len)(rest)?;

        let (rest, length) = if has_length {
            let (rest, len) = be_u16(rest)?;
            (rest, Some(len))
        } else {
            (rest, None)
        };

        Ok((rest, UnifiedHeader { length }))
    }
}
