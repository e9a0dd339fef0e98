use std::time::{Duration, Instant};

use dtls_piggyback::message::ProtocolVersion;
use dtls_piggyback::{ControllerState, Output, PiggybackAttributes, Role, StunMessageType};

use crate::common::*;

#[test]
fn peer_without_support_turns_piggybacking_off() {
    let _ = env_logger::try_init();
    let now = Instant::now();
    let f = dtls12_flights();

    let mut client = transport(true);
    let mut server = transport(false);
    client
        .attach_engine(ScriptedEngine::dtls12_client())
        .unwrap();
    server
        .attach_engine(ScriptedEngine::dtls12_server())
        .unwrap();
    assert_eq!(
        client.engine().unwrap().rto,
        Some(Duration::from_secs(3600))
    );
    assert_eq!(server.engine().unwrap().rto, Some(Duration::from_secs(1)));

    // The server neither reads nor writes the attributes.
    round_trip(&mut client, &mut server);
    assert!(server.engine().unwrap().injected.is_empty());

    assert_eq!(client.controller().state(), ControllerState::Off);
    assert_eq!(client.controller().data_to_attach(), None);
    assert!(client.prepare_outgoing(StunMessageType::Request).is_empty());
    assert_eq!(client.engine().unwrap().rto, Some(Duration::from_secs(1)));

    // The flight that only went in STUN is put on the path.
    let (out, _) = drain(&mut client, now);
    assert_eq!(datagrams(&out), vec![f.flight1.clone()]);

    // The handshake carries on over plain datagrams.
    for datagram in datagrams(&out) {
        server.handle_datagram(&datagram).unwrap();
    }
    let (out, _) = drain(&mut server, now);
    assert_eq!(datagrams(&out), f.flight2);

    client.handle_datagram(&datagrams(&out).concat()).unwrap();
    let (out, _) = drain(&mut client, now);
    assert_eq!(datagrams(&out), vec![f.flight3]);
    assert_eq!(server.engine().unwrap().injected, vec![f.flight1]);
}

#[test]
fn fall_back_sends_flight_held_from_path() {
    let now = Instant::now();
    let f = dtls12_flights();

    // Not writable: flight 1 travels only in STUN.
    let mut client = transport(true);
    client
        .attach_engine(ScriptedEngine::dtls12_client())
        .unwrap();
    let (out, _) = drain(&mut client, now);
    assert!(datagrams(&out).is_empty());

    client
        .handle_stun(StunMessageType::Response, &PiggybackAttributes::default())
        .unwrap();
    client.set_writable(true);
    client.handle_timeout(now);

    let (out, at) = drain(&mut client, now);
    assert_eq!(datagrams(&out), vec![f.flight1]);
    assert!(indications(&out).is_empty());
    assert!(at > now + Duration::from_secs(3600));
}

#[test]
fn fall_back_disarms_retransmit() {
    let now = Instant::now();
    let mut client = transport(true);
    client.set_writable(true);
    client.set_rtt(Duration::from_millis(100));
    client
        .attach_engine(ScriptedEngine::dtls12_client())
        .unwrap();

    client.handle_timeout(now);
    let (_, at) = drain(&mut client, now);
    assert!(at < now + Duration::from_secs(1));

    client
        .handle_stun(StunMessageType::Response, &PiggybackAttributes::default())
        .unwrap();
    assert_eq!(client.controller().state(), ControllerState::Off);

    client.handle_timeout(at);
    let (out, next) = drain(&mut client, at);
    assert!(indications(&out).is_empty());
    assert!(next > at + Duration::from_secs(3600));
}

#[test]
fn bare_indication_is_not_a_verdict() {
    let mut client = transport(true);
    client
        .attach_engine(ScriptedEngine::dtls12_client())
        .unwrap();

    client
        .handle_stun(StunMessageType::Indication, &PiggybackAttributes::default())
        .unwrap();
    assert_eq!(client.controller().state(), ControllerState::Tentative);
    assert!(client.controller().data_to_attach().is_some());
}

#[test]
fn bare_response_after_confirmation_is_ignored() {
    let mut client = transport(true);
    let mut server = transport(true);
    client
        .attach_engine(ScriptedEngine::dtls12_client())
        .unwrap();
    server
        .attach_engine(ScriptedEngine::dtls12_server())
        .unwrap();

    round_trip(&mut client, &mut server);
    assert_eq!(client.controller().state(), ControllerState::Confirmed);

    // E.g. a check answered by a path that dropped the attributes.
    client
        .handle_stun(StunMessageType::Response, &PiggybackAttributes::default())
        .unwrap();
    assert_eq!(client.controller().state(), ControllerState::Confirmed);
    assert!(client.controller().data_to_attach().is_some());
}

#[test]
fn restart_disables_for_good() {
    let now = Instant::now();
    let f = dtls12_flights();

    let mut client = transport(true);
    client
        .attach_engine(ScriptedEngine::dtls12_client())
        .unwrap();
    let (out, _) = drain(&mut client, now);
    assert!(datagrams(&out).is_empty());

    client
        .restart_handshake(ScriptedEngine::dtls12_client())
        .unwrap();
    assert_eq!(client.controller().state(), ControllerState::Off);
    assert!(!client.controller().is_enabled());
    assert_eq!(client.engine().unwrap().rto, Some(Duration::from_secs(1)));

    // Not writable yet, but with piggybacking off the flight goes out as is.
    let (out, at) = drain(&mut client, now);
    assert_eq!(datagrams(&out), vec![f.flight1]);
    assert!(at > now + Duration::from_secs(3600));

    // Attributes from the peer no longer matter.
    let attrs = PiggybackAttributes {
        data: Some(f.flight2.concat()),
        ack: Some(vec![0, 0]),
    };
    client
        .handle_stun(StunMessageType::Response, &attrs)
        .unwrap();
    assert!(client.engine().unwrap().injected.is_empty());
    assert!(client.prepare_outgoing(StunMessageType::Request).is_empty());
}

#[test]
fn restart_drops_output_of_abandoned_handshake() {
    let now = Instant::now();
    let f = dtls12_flights();
    let hello = handshake_record(0, &[(CLIENT_HELLO, 0, 44)]);
    assert_ne!(hello, f.flight1);

    let mut client = transport(true);
    client.set_writable(true);
    client
        .attach_engine(ScriptedEngine::dtls12_client())
        .unwrap();
    let rtp = [0x80, 0x6F, 0, 1, 0, 0, 0, 0, 0, 0, 0, 9, 0xAB];
    client.handle_datagram(&rtp).unwrap();

    client
        .restart_handshake(ScriptedEngine::new(
            Role::Client,
            ProtocolVersion::DTLS1_2,
            vec![hello.clone()],
            vec![],
        ))
        .unwrap();

    // Old flight 1 is gone, received media is still handed back.
    let (out, _) = drain(&mut client, now);
    assert_eq!(
        out,
        vec![
            Output::ApplicationPacket(rtp.to_vec()),
            Output::Datagram(hello),
        ]
    );
}
