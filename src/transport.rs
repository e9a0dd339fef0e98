//! Transport glue between the handshake engine, the connectivity checks
//! and the [`PiggybackController`].
//!
//! Everything is Sans-IO. Received STUN attributes go in through
//! [`TransportOrchestrator::handle_stun`], datagrams from the path through
//! [`TransportOrchestrator::handle_datagram`], and time through
//! [`TransportOrchestrator::handle_timeout`]. Work comes back out of
//! [`TransportOrchestrator::poll_output`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::controller::{PiggybackController, Role};
use crate::inspect::{
    is_any_handshake_record, is_first_flight_record, is_handshake_protocol_record,
};
use crate::message::ProtocolVersion;
use crate::rng::SeededRng;
use crate::sequence::SequenceChecker;
use crate::{Config, Error, Output};

const DISTANT_FUTURE: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// The handshake engine as seen from the transport.
///
/// Implemented by an adapter around the actual DTLS implementation.
pub trait HandshakeEngine {
    /// Next datagram the engine wants to send, if any.
    ///
    /// Called repeatedly until it returns `None`. Everything drained in one
    /// pass is treated as one flight.
    fn on_outgoing_handshake_bytes(&mut self) -> Option<Vec<u8>>;

    /// Feed handshake bytes received from the peer.
    fn inject_incoming_handshake_bytes(&mut self, data: &[u8]) -> Result<(), Error>;

    /// `Some` once the handshake has completed.
    fn completion(&self) -> Option<Completion>;

    /// Set the engine's own flight retransmit timeout.
    fn set_retransmit_timeout(&mut self, rto: Duration);
}

/// How the handshake completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub role: Role,
    pub version: ProtocolVersion,
}

/// Kind of STUN message being sent or received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StunMessageType {
    Request,
    Response,
    Indication,
}

/// The two piggyback attributes of a STUN message.
///
/// `None` means the attribute is absent. `Some` of an empty vec is an
/// attribute that is present with an empty value, which is not the same.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PiggybackAttributes {
    pub data: Option<Vec<u8>>,
    pub ack: Option<Vec<u8>>,
}

impl PiggybackAttributes {
    /// Whether neither attribute is present.
    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.ack.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timeout {
    Disabled,
    Unarmed,
    Armed(Instant),
}

/// Drives piggybacking for one transport.
pub struct TransportOrchestrator<E> {
    config: Arc<Config>,
    sequence: SequenceChecker,
    controller: PiggybackController,

    /// Handshake engine, once the local role is decided.
    engine: Option<E>,

    /// ClientHello that arrived before there was an engine to take it.
    first_flight: Option<Vec<u8>>,

    /// Whether the path can carry datagrams.
    writable: bool,

    /// Latest round-trip estimate of the connectivity checks.
    rtt: Option<Duration>,

    /// Set once the engine reported completion.
    connected: bool,

    /// Standalone retransmit of the pending flight.
    retransmit: Timeout,

    rng: SeededRng,

    queue_tx: VecDeque<Output>,
}

impl<E: HandshakeEngine> TransportOrchestrator<E> {
    pub fn new(config: Arc<Config>) -> Self {
        let controller = PiggybackController::new(config.dtls_in_stun());
        let rng = SeededRng::new(config.rng_seed());

        TransportOrchestrator {
            config,
            sequence: SequenceChecker::new(),
            controller,
            engine: None,
            first_flight: None,
            writable: false,
            rtt: None,
            connected: false,
            retransmit: Timeout::Disabled,
            rng,
            queue_tx: VecDeque::new(),
        }
    }

    /// Attach the handshake engine once the local role is known.
    ///
    /// A ClientHello cached before this point is replayed into the engine.
    pub fn attach_engine(&mut self, mut engine: E) -> Result<(), Error> {
        self.sequence.check();

        let rto = if self.controller.is_active() {
            self.config.piggyback_flight_rto()
        } else {
            self.config.flight_start_rto()
        };
        engine.set_retransmit_timeout(rto);

        self.engine = Some(engine);
        self.connected = false;

        if let Some(hello) = self.first_flight.take() {
            debug!("Replay cached first flight: {} bytes", hello.len());
            self.inject(&hello)?;
        }

        self.process_engine();
        Ok(())
    }

    /// Start over with a fresh engine.
    ///
    /// Piggybacking stays off for the rest of this transport's life.
    pub fn restart_handshake(&mut self, engine: E) -> Result<(), Error> {
        self.sequence.check();
        debug!("Handshake restart, disabling piggybacking");

        self.controller.disable();
        self.retransmit = Timeout::Disabled;
        self.first_flight = None;

        // Nothing from the abandoned handshake may reach the peer.
        self.queue_tx.retain(|o| matches!(o, Output::ApplicationPacket(_)));

        self.attach_engine(engine)
    }

    pub fn engine(&self) -> Option<&E> {
        self.sequence.check();
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.sequence.check();
        self.engine.as_mut()
    }

    pub fn controller(&self) -> &PiggybackController {
        self.sequence.check();
        &self.controller
    }

    /// Whether the handshake engine reported completion.
    pub fn is_connected(&self) -> bool {
        self.sequence.check();
        self.connected
    }

    /// Report whether the path can currently carry datagrams.
    pub fn set_writable(&mut self, writable: bool) {
        self.sequence.check();
        if self.writable != writable {
            debug!("Path writable: {}", writable);
        }
        self.writable = writable;
        if writable {
            self.kick_retransmit();
        }
    }

    /// Update the round-trip estimate that paces standalone retransmits.
    pub fn set_rtt(&mut self, rtt: Duration) {
        self.sequence.check();
        self.rtt = Some(rtt);
    }

    /// Attributes to attach to an outgoing STUN message.
    pub fn prepare_outgoing(&self, msg_type: StunMessageType) -> PiggybackAttributes {
        self.sequence.check();

        let attrs = PiggybackAttributes {
            data: self.controller.data_to_attach().map(<[u8]>::to_vec),
            ack: self.controller.ack_to_attach(),
        };

        if !attrs.is_empty() {
            trace!(
                "Attach to {:?}: data {:?} bytes, ack {:?} bytes",
                msg_type,
                attrs.data.as_ref().map(Vec::len),
                attrs.ack.as_ref().map(Vec::len)
            );
        }

        attrs
    }

    /// Handle the piggyback attributes of a received STUN message.
    ///
    /// Piggybacked handshake bytes are injected into the engine, once per
    /// message that carried them.
    pub fn handle_stun(
        &mut self,
        msg_type: StunMessageType,
        attrs: &PiggybackAttributes,
    ) -> Result<(), Error> {
        self.sequence.check();

        // A bare indication says nothing about peer support.
        if msg_type == StunMessageType::Indication && attrs.is_empty() {
            return Ok(());
        }

        // The controller drops its flight when it learns the peer lacks support.
        let flight = self.controller.data_to_attach().map(<[u8]>::to_vec);

        let report = self
            .controller
            .report_received(attrs.data.as_deref(), attrs.ack.as_deref());

        if report.peer_unsupported {
            self.fall_back(flight);
        }

        if let Some(bytes) = report.handshake_bytes {
            trace!("Piggybacked handshake bytes in {:?}: {}", msg_type, bytes.len());
            self.inject(bytes)?;
        }

        Ok(())
    }

    /// Handle a datagram received on the path outside the connectivity checks.
    ///
    /// Record layer traffic goes to the handshake engine, everything else is
    /// handed back as [`Output::ApplicationPacket`].
    pub fn handle_datagram(&mut self, datagram: &[u8]) -> Result<(), Error> {
        self.sequence.check();

        if !is_handshake_protocol_record(datagram) {
            self.queue_tx
                .push_back(Output::ApplicationPacket(datagram.to_vec()));
            return Ok(());
        }

        self.inject(datagram)
    }

    pub fn handle_timeout(&mut self, now: Instant) {
        self.sequence.check();

        match self.retransmit {
            Timeout::Disabled => {}
            Timeout::Unarmed => {
                if self.should_retransmit() && self.controller.data_to_attach().is_some() {
                    let interval = self.retransmit_interval();
                    trace!("Retransmit in {:.03}s", interval.as_secs_f32());
                    self.retransmit = Timeout::Armed(now + interval);
                } else {
                    self.retransmit = Timeout::Disabled;
                }
            }
            Timeout::Armed(at) if now >= at => self.retransmit_tick(now),
            Timeout::Armed(_) => {}
        }
    }

    pub fn poll_output(&mut self, now: Instant) -> Output {
        self.sequence.check();

        if let Some(output) = self.queue_tx.pop_front() {
            return output;
        }

        let next = match self.retransmit {
            Timeout::Armed(at) => at,
            Timeout::Unarmed => now,
            Timeout::Disabled => now + DISTANT_FUTURE,
        };
        Output::Timeout(next)
    }

    fn inject(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let Some(engine) = self.engine.as_mut() else {
            if is_first_flight_record(bytes) {
                debug!("Cache first flight until an engine is attached");
                self.first_flight = Some(bytes.to_vec());
            } else if is_any_handshake_record(bytes) {
                debug!("Drop handshake record, no engine attached");
            } else {
                trace!("Drop {} bytes, no engine attached", bytes.len());
            }
            return Ok(());
        };

        engine.inject_incoming_handshake_bytes(bytes)?;
        self.process_engine();

        Ok(())
    }

    /// Drain the engine's output and check for completion.
    fn process_engine(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        let active = self.controller.is_active();
        let mut flight = Vec::new();

        while let Some(datagram) = engine.on_outgoing_handshake_bytes() {
            if active {
                flight.extend_from_slice(&datagram);
            }
            // Before the path is writable the flight only travels in STUN.
            if self.writable || !active {
                self.queue_tx.push_back(Output::Datagram(datagram));
            }
        }

        if !flight.is_empty() {
            self.controller.capture_outgoing(&flight);
            self.kick_retransmit();
        }

        if self.connected {
            return;
        }

        if let Some(completion) = self.engine.as_ref().and_then(|e| e.completion()) {
            debug!("Handshake engine connected");
            self.connected = true;
            self.controller
                .set_handshake_complete(completion.role, completion.version);
        }
    }

    fn fall_back(&mut self, flight: Option<Vec<u8>>) {
        debug!("Peer does not support piggybacking, continue with plain handshake");
        self.retransmit = Timeout::Disabled;

        if let Some(engine) = self.engine.as_mut() {
            engine.set_retransmit_timeout(self.config.flight_start_rto());
        }

        // The engine's timer may still be far out, so the pending flight
        // goes on the path right away.
        if let Some(flight) = flight {
            debug!("Send pending flight as datagram: {} bytes", flight.len());
            self.queue_tx.push_back(Output::Datagram(flight));
        }
    }

    fn should_retransmit(&self) -> bool {
        self.controller.is_enabled()
            && self.controller.is_active()
            && self.writable
            && !self.connected
    }

    /// Schedule a retransmit of the pending flight unless one is already
    /// scheduled.
    fn kick_retransmit(&mut self) {
        if !self.controller.is_active() || self.controller.data_to_attach().is_none() {
            return;
        }
        if self.retransmit == Timeout::Disabled {
            self.retransmit = Timeout::Unarmed;
        }
    }

    fn retransmit_tick(&mut self, now: Instant) {
        if !self.should_retransmit() {
            trace!("Stop retransmit, state {}", self.controller.state());
            self.retransmit = Timeout::Disabled;
            return;
        }

        let Some(data) = self.controller.data_to_attach() else {
            trace!("Stop retransmit, nothing pending");
            self.retransmit = Timeout::Disabled;
            return;
        };

        let attrs = PiggybackAttributes {
            data: Some(data.to_vec()),
            ack: self.controller.ack_to_attach(),
        };
        debug!("Retransmit pending flight in indication");
        self.queue_tx.push_back(Output::Indication(attrs));

        let interval = self.retransmit_interval();
        self.retransmit = Timeout::Armed(now + interval);
    }

    fn retransmit_interval(&mut self) -> Duration {
        let min = self.config.retransmit_min_interval();
        let max = self.config.retransmit_max_interval();
        let base = self.rtt.unwrap_or(max);
        base.mul_f32(self.rng.jitter_factor()).clamp(min, max)
    }
}

impl<E> std::fmt::Debug for TransportOrchestrator<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportOrchestrator")
            .field("controller", &self.controller)
            .field("engine", &self.engine.is_some())
            .field("writable", &self.writable)
            .field("connected", &self.connected)
            .field("retransmit", &self.retransmit)
            .finish()
    }
}
