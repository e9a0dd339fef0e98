use std::sync::Arc;
use std::time::{Duration, Instant};

use dtls_piggyback::{Config, Output, TransportOrchestrator};

use crate::common::*;

fn writable_client(rtt: Option<Duration>) -> Transport {
    let mut client = transport(true);
    client.set_writable(true);
    if let Some(rtt) = rtt {
        client.set_rtt(rtt);
    }
    client
        .attach_engine(ScriptedEngine::dtls12_client())
        .unwrap();
    client
}

#[test]
fn pending_flight_is_retransmitted_in_indications() {
    let _ = env_logger::try_init();
    let now = Instant::now();
    let f = dtls12_flights();
    let mut client = writable_client(Some(Duration::from_millis(100)));

    // Writable: the flight also goes out directly.
    let (out, at) = drain(&mut client, now);
    assert_eq!(datagrams(&out), vec![f.flight1.clone()]);
    assert_eq!(at, now);

    client.handle_timeout(now);
    let (out, at) = drain(&mut client, now);
    assert!(out.is_empty());
    assert!(at >= now + Duration::from_millis(87), "{:?}", at - now);
    assert!(at <= now + Duration::from_millis(113), "{:?}", at - now);

    // Not due yet.
    client.handle_timeout(at - Duration::from_millis(1));
    let (out, same) = drain(&mut client, now);
    assert!(out.is_empty());
    assert_eq!(same, at);

    client.handle_timeout(at);
    let (out, next) = drain(&mut client, at);
    let sent = indications(&out);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data.as_deref(), Some(&f.flight1[..]));
    assert_eq!(sent[0].ack, Some(vec![]));
    assert!(next > at);

    // Kicking an armed loop leaves the deadline alone.
    client.set_writable(true);
    let (_, still) = drain(&mut client, at);
    assert_eq!(still, next);

    // Once connected the loop stops.
    client.handle_datagram(&f.flight2.concat()).unwrap();
    client.handle_datagram(&f.flight4).unwrap();
    assert!(client.is_connected());

    client.handle_timeout(next);
    let (out, idle) = drain(&mut client, next);
    assert!(indications(&out).is_empty());
    assert!(idle > next + Duration::from_secs(3600));
}

#[test]
fn retransmit_waits_for_writable_path() {
    let now = Instant::now();
    let mut client = transport(true);
    client
        .attach_engine(ScriptedEngine::dtls12_client())
        .unwrap();

    let (out, at) = drain(&mut client, now);
    assert!(out.is_empty());
    assert_eq!(at, now);

    client.handle_timeout(now);
    let (_, at) = drain(&mut client, now);
    assert!(at > now + Duration::from_secs(3600));

    client.set_writable(true);
    let (_, at) = drain(&mut client, now);
    assert_eq!(at, now);

    client.handle_timeout(now);
    let (_, at) = drain(&mut client, now);
    assert!(at > now && at <= now + Duration::from_secs(1));
}

#[test]
fn interval_without_rtt_is_capped() {
    let now = Instant::now();
    let mut client = writable_client(None);
    let _ = drain(&mut client, now);

    client.handle_timeout(now);
    let (_, at) = drain(&mut client, now);
    assert!(at >= now + Duration::from_millis(874), "{:?}", at - now);
    assert!(at <= now + Duration::from_secs(1), "{:?}", at - now);
}

#[test]
fn interval_respects_minimum() {
    let now = Instant::now();
    let config = Config::builder()
        .dtls_in_stun(true)
        .retransmit_min_interval(Duration::from_millis(200))
        .rng_seed(7)
        .build()
        .unwrap();
    let mut client: Transport = TransportOrchestrator::new(Arc::new(config));
    client.set_writable(true);
    client.set_rtt(Duration::from_millis(10));
    client
        .attach_engine(ScriptedEngine::dtls12_client())
        .unwrap();
    let _ = drain(&mut client, now);

    client.handle_timeout(now);
    let (_, at) = drain(&mut client, now);
    assert_eq!(at, now + Duration::from_millis(200));
}

#[test]
fn no_retransmit_when_disabled() {
    let now = Instant::now();
    let mut client = transport(false);
    client.set_writable(true);
    client
        .attach_engine(ScriptedEngine::dtls12_client())
        .unwrap();

    let (out, at) = drain(&mut client, now);
    assert_eq!(out.len(), 1);
    assert!(matches!(out[0], Output::Datagram(_)));
    assert!(at > now + Duration::from_secs(3600));
}
