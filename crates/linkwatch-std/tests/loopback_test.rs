//! Integration tests for the supervisor with real sockets.
//!
//! These tests drive a `ConnectionSupervisor` over loopback with the
//! simulated radio, checking that the listening socket really opens and
//! closes with the connection state.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use linkwatch_core::{ConnectionState, Credentials, FailureReason, RetryPolicy, SupervisorConfig};
use linkwatch_std::{
    Command, HostSupervisor, SimulatedRadio, SimulationPlan, SystemClock, TcpSocketFactory,
};

/// Build a supervisor listening on an ephemeral loopback port.
fn loopback_supervisor(plan: SimulationPlan, port: u16) -> HostSupervisor {
    let config = SupervisorConfig {
        retry: RetryPolicy::default()
            .with_backoff(Duration::from_millis(10), Duration::from_millis(50))
            .with_association_timeout(Duration::from_secs(2)),
        port,
        poll_interval: Duration::from_millis(5),
        ..Default::default()
    };
    HostSupervisor::new(
        config,
        SimulatedRadio::new(plan),
        TcpSocketFactory::loopback(),
        SystemClock::new(),
    )
}

fn instant_plan() -> SimulationPlan {
    SimulationPlan {
        association_delay: Duration::ZERO,
        ..Default::default()
    }
}

fn creds() -> Credentials {
    Credentials::new("lab-net", "secret").unwrap()
}

/// Poll until `done` holds or five seconds pass.
fn poll_until(sup: &mut HostSupervisor, done: impl Fn(&ConnectionState) -> bool) -> ConnectionState {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let state = sup.poll();
        if done(&state) || Instant::now() > deadline {
            return state;
        }
        thread::sleep(sup.poll_interval());
    }
}

fn bound_addr(sup: &HostSupervisor) -> SocketAddr {
    sup.socket().expect("socket while connected").local_addr()
}

#[test]
fn test_connect_accepts_clients() {
    let mut sup = loopback_supervisor(instant_plan(), 0);
    sup.start(creds());

    let state = poll_until(&mut sup, ConnectionState::is_connected);
    assert_eq!(state, ConnectionState::Connected);

    let addr = bound_addr(&sup);
    let _client = TcpStream::connect(addr).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut accepted = None;
    while accepted.is_none() && Instant::now() < deadline {
        accepted = sup.socket().unwrap().try_accept().unwrap();
        thread::sleep(Duration::from_millis(5));
    }
    let (_stream, peer) = accepted.expect("client accepted");
    assert!(peer.ip().is_loopback());
}

#[test]
fn test_stop_closes_listener() {
    let mut sup = loopback_supervisor(instant_plan(), 0);
    sup.start(creds());
    poll_until(&mut sup, ConnectionState::is_connected);
    let addr = bound_addr(&sup);

    sup.stop();
    assert_eq!(sup.status(), &ConnectionState::Idle);
    assert!(sup.socket().is_none());
    assert!(TcpStream::connect(addr).is_err());
}

#[test]
fn test_link_drop_rebinds() {
    let mut sup = loopback_supervisor(instant_plan(), 0);
    sup.start(creds());
    poll_until(&mut sup, ConnectionState::is_connected);

    sup.radio_mut().drop_link();
    let state = sup.poll();
    assert!(matches!(state, ConnectionState::Backoff(_)));
    assert!(sup.socket().is_none());
    assert_eq!(sup.last_failure(), Some(&FailureReason::LinkLost));

    let state = poll_until(&mut sup, ConnectionState::is_connected);
    assert_eq!(state, ConnectionState::Connected);
    assert_eq!(sup.attempts(), 0);
    assert_eq!(sup.radio().begins(), 2);
}

#[test]
fn test_port_in_use_fails() {
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let mut sup = loopback_supervisor(instant_plan(), port);
    sup.start(creds());
    let state = poll_until(&mut sup, |s| matches!(s, ConnectionState::Failed(_)));

    match state {
        ConnectionState::Failed(FailureReason::SocketBindFailure { port: failed, .. }) => {
            assert_eq!(failed, port)
        }
        other => panic!("expected bind failure, got {:?}", other),
    }

    // Not retried on its own.
    thread::sleep(Duration::from_millis(100));
    assert!(matches!(sup.poll(), ConnectionState::Failed(_)));
    assert_eq!(sup.radio().begins(), 1);
}

#[test]
fn test_rejections_then_success() {
    let plan = SimulationPlan {
        reject_first: 2,
        ..instant_plan()
    };
    let mut sup = loopback_supervisor(plan, 0);
    sup.start(creds());

    let state = poll_until(&mut sup, ConnectionState::is_connected);
    assert_eq!(state, ConnectionState::Connected);
    assert_eq!(sup.radio().begins(), 3);

    let visited: Vec<&str> = sup.drain_events().iter().map(|e| e.state.name()).collect();
    assert_eq!(
        visited,
        vec!["associating", "backoff", "associating", "backoff", "associating", "connected"]
    );
}

#[test]
fn test_command_driven_session() {
    let mut sup = loopback_supervisor(instant_plan(), 0);

    for line in ["connect", "status", "disconnect"] {
        match line.parse::<Command>().unwrap() {
            Command::Connect => {
                sup.start(creds());
                poll_until(&mut sup, ConnectionState::is_connected);
            }
            Command::Status => assert!(sup.status().is_connected()),
            Command::Disconnect => sup.stop(),
            other => panic!("unexpected {:?}", other),
        }
    }

    assert_eq!(sup.status(), &ConnectionState::Idle);
}
