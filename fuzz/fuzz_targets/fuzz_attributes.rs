#![no_main]

//! Fuzz target for received piggyback attributes.
//!
//! The first byte picks which attributes are present, the rest is split
//! into data and ack.

use libfuzzer_sys::fuzz_target;

use dtls_piggyback::{ControllerState, PiggybackController};

fuzz_target!(|input: &[u8]| {
    let Some((&selector, rest)) = input.split_first() else {
        return;
    };

    let split = rest.first().map(|b| *b as usize % (rest.len() + 1)).unwrap_or(0);
    let (data, ack) = rest.split_at(split);

    let data = (selector & 1 != 0).then_some(data);
    let ack = (selector & 2 != 0).then_some(ack);

    let mut controller = PiggybackController::new(true);
    if selector & 4 != 0 {
        controller.capture_outgoing(rest);
    }

    let report = controller.report_received(data, ack);

    if let Some(bytes) = report.handshake_bytes {
        assert!(!bytes.is_empty());
    }
    if report.peer_unsupported {
        assert_eq!(controller.state(), ControllerState::Off);
        assert!(controller.data_to_attach().is_none());
    }
});
