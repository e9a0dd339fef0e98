//! Piggyback state machine.
//!
//! One controller serves one transport. It holds at most one outstanding
//! outgoing flight and the set of peer handshake message sequence numbers
//! seen so far, and decides what rides along on each connectivity check.
//!
//! ```text
//!              report(-, -)
//!  TENTATIVE ---------------> OFF
//!      |
//!      | report(data or ack)
//!      v
//!  CONFIRMED
//!      |
//!      | set_handshake_complete
//!      v
//!   PENDING  -- report(-, -) or report(-, non-empty ack) --> COMPLETE
//! ```
//!
//! TENTATIVE may also go straight to PENDING when the handshake completes
//! before the peer answered with any attribute.

use std::fmt;

use crate::inspect::extract_handshake_message_sequence_numbers;
use crate::message::{parse_acks, serialize_acks, ProtocolVersion};
use crate::sequence::SequenceChecker;

/// Current piggyback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Piggybacking opportunistically, peer support not yet known.
    Tentative,
    /// Peer answered with piggyback attributes.
    Confirmed,
    /// Local handshake done, waiting for the final ack exchange.
    Pending,
    /// Mechanism retired after a successful handshake.
    Complete,
    /// Peer does not support piggybacking, or it was disabled locally.
    Off,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerState::Tentative => "TENTATIVE",
            ControllerState::Confirmed => "CONFIRMED",
            ControllerState::Pending => "PENDING",
            ControllerState::Complete => "COMPLETE",
            ControllerState::Off => "OFF",
        };
        f.write_str(s)
    }
}

/// Local handshake role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Whether the local side sends the last retransmittable flight.
///
/// A 1.2 server closes the handshake with ChangeCipherSpec/Finished, a 1.3
/// client closes it with its Finished. The side that sent the last flight
/// must be able to resend it until the peer shows it arrived.
pub fn owns_last_flight(role: Role, version: ProtocolVersion) -> bool {
    let is_client = role == Role::Client;
    is_client == version.swaps_last_flight()
}

/// Outcome of [`PiggybackController::report_received`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report<'a> {
    /// Handshake bytes the peer piggybacked, to feed the handshake engine.
    pub handshake_bytes: Option<&'a [u8]>,
    /// The peer just showed it does not support piggybacking.
    pub peer_unsupported: bool,
}

/// Piggyback state machine for one transport.
///
/// Holds at most one outstanding flight: every capture replaces the
/// previous one. The owner is expected to hand over a whole flight per
/// capture.
#[derive(Debug)]
pub struct PiggybackController {
    sequence: SequenceChecker,
    enabled: bool,
    state: ControllerState,
    /// Latest outgoing flight not yet known to be delivered.
    pending: Vec<u8>,
    /// Epoch 0 message sequence numbers received, insertion ordered.
    received_seqs: Vec<u16>,
}

impl PiggybackController {
    /// Create a controller.
    ///
    /// `enabled` is the negotiated capability. A disabled controller starts
    /// in [`ControllerState::Off`] and never attaches or consumes anything.
    pub fn new(enabled: bool) -> Self {
        let state = if enabled {
            ControllerState::Tentative
        } else {
            ControllerState::Off
        };

        PiggybackController {
            sequence: SequenceChecker::new(),
            enabled,
            state,
            pending: Vec::new(),
            received_seqs: Vec::new(),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.sequence.check();
        self.state
    }

    /// Whether the capability flag is still set.
    pub fn is_enabled(&self) -> bool {
        self.sequence.check();
        self.enabled
    }

    /// Whether the controller still attaches or consumes attributes.
    pub fn is_active(&self) -> bool {
        self.sequence.check();
        self.is_participating()
    }

    /// Turn the mechanism off for good, e.g. on handshake restart.
    ///
    /// Caches are cleared but kept allocated.
    pub fn disable(&mut self) {
        self.sequence.check();
        self.enabled = false;
        if self.state != ControllerState::Off {
            self.transition(ControllerState::Off);
        }
        self.clear();
    }

    /// Remember an outgoing flight, replacing whatever was pending.
    pub fn capture_outgoing(&mut self, flight: &[u8]) {
        self.sequence.check();
        if !self.is_participating() {
            return;
        }
        trace!("Capture outgoing flight: {} bytes", flight.len());
        self.pending.clear();
        self.pending.extend_from_slice(flight);
    }

    /// Handshake bytes to attach to the next outgoing message.
    ///
    /// Returns the same bytes on every call until a new flight is captured
    /// or the flight is dropped.
    pub fn data_to_attach(&self) -> Option<&[u8]> {
        self.sequence.check();
        if !self.is_participating() || self.pending.is_empty() {
            return None;
        }
        Some(&self.pending)
    }

    /// Ack payload to attach to the next outgoing message.
    ///
    /// An empty payload is still `Some`: it says we take part but have
    /// nothing to acknowledge yet.
    pub fn ack_to_attach(&self) -> Option<Vec<u8>> {
        self.sequence.check();
        if !self.is_participating() {
            return None;
        }
        Some(serialize_acks(&self.received_seqs))
    }

    /// Process the piggyback attributes of one received message.
    pub fn report_received<'a>(
        &mut self,
        data: Option<&'a [u8]>,
        ack: Option<&[u8]>,
    ) -> Report<'a> {
        self.sequence.check();
        let mut report = Report::default();

        if !self.is_participating() {
            return report;
        }

        if data.is_none() && ack.is_none() {
            match self.state {
                ControllerState::Tentative => {
                    debug!("Peer sent no piggyback attributes, falling back");
                    self.transition(ControllerState::Off);
                    self.clear();
                    report.peer_unsupported = true;
                }
                ControllerState::Pending => {
                    // The peer stopped attaching when it reached COMPLETE.
                    self.transition(ControllerState::Complete);
                    self.clear();
                }
                _ => {}
            }
            return report;
        }

        if self.state == ControllerState::Tentative {
            self.transition(ControllerState::Confirmed);
        }

        if let Some(ack) = ack {
            match parse_acks(ack) {
                Ok(seqs) => trace!("Peer acked handshake messages: {:?}", seqs),
                Err(e) => debug!("Malformed piggybacked ack: {}", e),
            }
        }

        if let Some(data) = data.filter(|d| !d.is_empty()) {
            match extract_handshake_message_sequence_numbers(data) {
                Ok(seqs) => {
                    for seq in seqs {
                        if !self.received_seqs.contains(&seq) {
                            self.received_seqs.push(seq);
                        }
                    }
                }
                Err(e) => debug!("Failed to parse piggybacked handshake data: {}", e),
            }
            report.handshake_bytes = Some(data);
        }

        let non_empty_ack = ack.is_some_and(|a| !a.is_empty());
        if self.state == ControllerState::Pending && data.is_none() && non_empty_ack {
            self.transition(ControllerState::Complete);
            self.clear();
        }

        report
    }

    /// The local handshake engine finished.
    ///
    /// Moves to PENDING. The side that does not own the last flight drops
    /// its pending flight right away, since there is nothing left for it to
    /// resend.
    pub fn set_handshake_complete(&mut self, role: Role, version: ProtocolVersion) {
        self.sequence.check();
        if !matches!(
            self.state,
            ControllerState::Tentative | ControllerState::Confirmed
        ) {
            return;
        }

        if !owns_last_flight(role, version) {
            self.pending.clear();
        }

        debug!("Handshake complete as {:?} ({})", role, version);
        self.transition(ControllerState::Pending);
    }

    fn is_participating(&self) -> bool {
        !matches!(self.state, ControllerState::Off | ControllerState::Complete)
    }

    fn transition(&mut self, state: ControllerState) {
        debug!("Piggyback {} -> {}", self.state, state);
        self.state = state;
    }

    fn clear(&mut self) {
        self.pending.clear();
        self.received_seqs.clear();
    }
}
