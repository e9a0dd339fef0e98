//! dtls-piggyback carries DTLS handshake records inside STUN connectivity
//! checks, so the secure channel can be established while ICE is still
//! checking candidate pairs.
//!
//! The crate is Sans-IO. It never touches a socket or spawns a task:
//!
//! * [`inspect`] classifies record buffers and extracts handshake message
//!   sequence numbers from them.
//! * [`PiggybackController`] is the per-transport state machine deciding
//!   what to attach to each STUN message and what to take from each
//!   received one.
//! * [`TransportOrchestrator`] wires the controller to a
//!   [`HandshakeEngine`] and to the STUN layer, and paces standalone
//!   retransmits of the pending flight.
//!
//! If the peer turns out not to support piggybacking the handshake falls
//! back to plain datagrams. Failures of the mechanism never fail the
//! connection.
//!
//! ```
//! use dtls_piggyback::{Config, ControllerState, PiggybackController};
//!
//! let config = Config::builder().dtls_in_stun(true).build().unwrap();
//! let mut controller = PiggybackController::new(config.dtls_in_stun());
//!
//! // Nothing captured yet, but we take part: an empty ack is attached.
//! assert_eq!(controller.data_to_attach(), None);
//! assert_eq!(controller.ack_to_attach(), Some(vec![]));
//!
//! // A STUN response without any piggyback attribute: no peer support.
//! let report = controller.report_received(None, None);
//! assert!(report.peer_unsupported);
//! assert_eq!(controller.state(), ControllerState::Off);
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

use std::time::Instant;

mod config;
pub use config::{Config, ConfigBuilder};

mod controller;
pub use controller::{owns_last_flight, ControllerState, PiggybackController, Report, Role};

mod error;
pub use error::{Error, ParseError, ParseErrorKind};

pub mod inspect;
pub mod message;

mod rng;
mod sequence;

mod transport;
pub use transport::{
    Completion, HandshakeEngine, PiggybackAttributes, StunMessageType, TransportOrchestrator,
};

/// Work produced by [`TransportOrchestrator::poll_output`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Handshake datagram to send on the path, outside the STUN checks.
    Datagram(Vec<u8>),
    /// Send a STUN indication carrying these attributes.
    Indication(PiggybackAttributes),
    /// Received datagram that is not record layer traffic, e.g. SRTP.
    ApplicationPacket(Vec<u8>),
    /// Nothing queued. Call `handle_timeout` at this instant.
    Timeout(Instant),
}
