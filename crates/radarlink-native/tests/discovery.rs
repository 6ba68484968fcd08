//! Board discovery against simulated ports.

use std::time::Duration;

use radarlink_native::bridge::{Discovery, SimulatedBoard, SimulatedConnector};
use radarlink_native::config::{FALLBACK_BAUD_RATE, PRIMARY_BAUD_RATE};
use radarlink_native::{AttemptError, DiscoveryConfig};

fn discovery(connector: SimulatedConnector) -> Discovery<SimulatedConnector> {
    let config = DiscoveryConfig { probe_timeout: Duration::from_millis(25), ..DiscoveryConfig::default() };
    Discovery::with_config(connector, config)
}

#[test]
fn test_fallback_rate_only() {
    let board = SimulatedBoard::default().with_baud_rates(&[FALLBACK_BAUD_RATE]);
    let discovery = discovery(SimulatedConnector::new("/dev/ttyACM0", board));

    let mut session = discovery.discover(&["/dev/ttyACM0"]).expect("board on fallback rate");
    assert_eq!(session.baud_rate(), 1_000_000);
    assert_eq!(session.identifier(), "/dev/ttyACM0");

    let calls = discovery.connector().open_calls();
    assert_eq!(calls.iter().map(|(_, rate)| *rate).collect::<Vec<_>>(), vec![PRIMARY_BAUD_RATE, FALLBACK_BAUD_RATE]);

    // Primary attempt's transport closed, session's still open
    assert_eq!(discovery.connector().open_transports(), 1);
    session.close();
    assert_eq!(discovery.connector().open_transports(), 0);
}

#[test]
fn test_neither_rate_is_not_found() {
    let board = SimulatedBoard::default().with_baud_rates(&[]);
    let discovery = discovery(SimulatedConnector::new("/dev/ttyACM0", board));

    let err = discovery.discover(&["/dev/ttyACM0"]).unwrap_err();
    assert_eq!(err.attempts.len(), 2);
    assert_eq!(err.attempts[0].baud_rate, PRIMARY_BAUD_RATE);
    assert_eq!(err.attempts[1].baud_rate, FALLBACK_BAUD_RATE);
    assert!(err.attempts.iter().all(|a| a.cause.is_retryable()));

    assert_eq!(discovery.connector().open_calls().len(), 2);
    assert_eq!(discovery.connector().open_transports(), 0);
}

#[test]
fn test_falls_through_to_next_candidate() {
    let dead = SimulatedBoard::default().with_baud_rates(&[]);
    let connector = SimulatedConnector::new("/dev/ttyACM0", dead).with_port("/dev/ttyACM1", SimulatedBoard::default());
    let discovery = discovery(connector);

    let session = discovery.discover(&["/dev/ttyACM0", "/dev/ttyACM1"]).unwrap();
    assert_eq!(session.identifier(), "/dev/ttyACM1");
    assert_eq!(session.baud_rate(), PRIMARY_BAUD_RATE);
    assert_eq!(discovery.connector().open_calls().len(), 3);
}

#[test]
fn test_empty_candidate_list() {
    let discovery = discovery(SimulatedConnector::new("sim0", SimulatedBoard::default()));
    let err = discovery.discover::<&str>(&[]).unwrap_err();
    assert!(err.attempts.is_empty());
}

#[test]
fn test_parallel_prefers_caller_order() {
    let connector = SimulatedConnector::new("a", SimulatedBoard::default().with_baud_rates(&[]))
        .with_port("b", SimulatedBoard::default().with_baud_rates(&[FALLBACK_BAUD_RATE]))
        .with_port("c", SimulatedBoard::default());
    let discovery = discovery(connector);

    let session = discovery.discover_parallel(&["a", "b", "c"]).unwrap();
    assert_eq!(session.identifier(), "b");
    assert_eq!(session.baud_rate(), FALLBACK_BAUD_RATE);

    // "c" was found too, then closed
    assert_eq!(discovery.connector().open_transports(), 1);
}

#[test]
fn test_parallel_not_found_collects_all_attempts() {
    let dead = SimulatedBoard::default().with_corrupt_replies();
    let connector = SimulatedConnector::new("a", dead.clone()).with_port("b", dead);
    let discovery = discovery(connector);

    let err = discovery.discover_parallel(&["a", "b"]).unwrap_err();
    assert_eq!(err.attempts.len(), 4);
    assert_eq!(err.attempts[0].identifier, "a");
    assert_eq!(err.attempts[3].identifier, "b");
    assert!(err.attempts.iter().all(|a| matches!(a.cause, AttemptError::Integrity(_))));
    assert_eq!(discovery.connector().open_transports(), 0);
}
