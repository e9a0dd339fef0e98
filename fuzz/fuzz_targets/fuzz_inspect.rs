#![no_main]

//! Fuzz target for the record inspection functions.
//!
//! Runs the input as-is, and wrapped in a plaintext handshake record so
//! the fragment walk gets exercised beyond the record header.

use libfuzzer_sys::fuzz_target;

use dtls_piggyback::inspect::{
    extract_handshake_message_sequence_numbers, is_any_handshake_record,
    is_first_flight_record, is_handshake_protocol_record,
};

/// Record header length
const RECORD_HEADER_LEN: usize = 13;

fuzz_target!(|data: &[u8]| {
    inspect(data);

    if !data.is_empty() {
        let len = data.len().min(u16::MAX as usize);

        let mut record = Vec::with_capacity(RECORD_HEADER_LEN + len);
        record.push(22u8); // Handshake
        record.extend_from_slice(&[0xFE, 0xFD]);
        record.extend_from_slice(&[0, 0]); // epoch 0
        record.extend_from_slice(&[0, 0, 0, 0, 0, 1]);
        record.extend_from_slice(&(len as u16).to_be_bytes());
        record.extend_from_slice(&data[..len]);

        inspect(&record);
    }
});

fn inspect(data: &[u8]) {
    let first_flight = is_first_flight_record(data);
    let any = is_any_handshake_record(data);
    let protocol = is_handshake_protocol_record(data);

    assert!(!first_flight || any);
    assert!(!any || protocol);

    let _ = extract_handshake_message_sequence_numbers(data);
}
