//! Connection-lifecycle supervisor.
//!
//! Drives a [`Radio`] through association, keeps a listening socket alive
//! while the link is up and recovers from failures with bounded backoff.
//!
//! ```text
//!            start                  link up + bind ok
//!   Idle ───────────► Associating ───────────────────► Connected
//!    ▲                  │     ▲                            │
//!    │ stop     timeout │     │ timer elapsed    link lost │
//!    │         rejected ▼     │                            │
//!    └──────────────── Backoff ◄───────────────────────────┘
//!                        │
//!                        │ attempts exhausted   (bind failure from
//!                        ▼                       Associating also lands here)
//!                      Failed
//! ```
//!
//! Nothing here blocks: the owner calls [`ConnectionSupervisor::poll`] from
//! its own loop and every call advances at most one transition.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::driver::{Clock, LinkStatus, Radio, RadioError, SocketFactory};
use crate::model::{ConnectionState, Credentials, FailureReason, LinkInfo, StatusEvent};
use crate::policy::RetryPolicy;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 80;

/// Static configuration for a supervisor instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Retry and backoff bounds.
    pub retry: RetryPolicy,
    /// Port the listening socket binds to.
    pub port: u16,
    /// How often the owner is expected to call `poll()`.
    pub poll_interval: Duration,
    /// Status events kept before the oldest are dropped.
    pub event_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            port: DEFAULT_PORT,
            poll_interval: Duration::from_millis(500),
            event_capacity: 32,
        }
    }
}

/// Owns the association state machine, the retry counter and the
/// listening socket.
pub struct ConnectionSupervisor<R, F, C>
where
    R: Radio,
    F: SocketFactory,
    C: Clock,
{
    config: SupervisorConfig,
    radio: R,
    sockets: F,
    clock: C,
    credentials: Option<Credentials>,
    state: ConnectionState,
    /// Present iff `state` is `Connected`.
    socket: Option<F::Socket>,
    link: Option<LinkInfo>,
    attempts: u32,
    attempt_started: Duration,
    /// Driver refusal from `begin`, consumed by the next `poll`.
    begin_error: Option<RadioError>,
    last_failure: Option<FailureReason>,
    events: VecDeque<StatusEvent>,
}

impl<R, F, C> ConnectionSupervisor<R, F, C>
where
    R: Radio,
    F: SocketFactory,
    C: Clock,
{
    /// Create an idle supervisor.
    pub fn new(config: SupervisorConfig, radio: R, sockets: F, clock: C) -> Self {
        let events = VecDeque::with_capacity(config.event_capacity);
        Self {
            config,
            radio,
            sockets,
            clock,
            credentials: None,
            state: ConnectionState::Idle,
            socket: None,
            link: None,
            attempts: 0,
            attempt_started: Duration::ZERO,
            begin_error: None,
            last_failure: None,
            events,
        }
    }

    /// Begin connecting with `credentials`.
    ///
    /// No-op while `Associating` or `Connected`. From any other state the
    /// attempt counter is reset and a fresh association starts.
    pub fn start(&mut self, credentials: Credentials) {
        if matches!(
            self.state,
            ConnectionState::Associating | ConnectionState::Connected
        ) {
            debug!(state = self.state.name(), "start ignored, already running");
            return;
        }

        info!(ssid = credentials.ssid(), "starting connection");
        self.credentials = Some(credentials);
        self.attempts = 0;
        self.begin_attempt();
    }

    /// Advance the state machine by at most one step and return the
    /// resulting state.
    pub fn poll(&mut self) -> ConnectionState {
        match self.state {
            ConnectionState::Idle | ConnectionState::Failed(_) => {}
            ConnectionState::Associating => self.poll_associating(),
            ConnectionState::Connected => self.poll_connected(),
            ConnectionState::Backoff(until) => self.poll_backoff(until),
        }
        self.state.clone()
    }

    /// Tear everything down and go `Idle`. Cancels any pending backoff.
    pub fn stop(&mut self) {
        if self.state == ConnectionState::Idle {
            return;
        }

        info!(state = self.state.name(), "stopping connection");
        self.radio.disconnect();
        self.begin_error = None;
        self.transition(ConnectionState::Idle);
    }

    /// `stop()` then `start()` again with the last credentials, if any.
    pub fn reset(&mut self) {
        self.stop();
        if let Some(credentials) = self.credentials.clone() {
            self.start(credentials);
        }
    }

    /// Current state. Pure read.
    pub fn status(&self) -> &ConnectionState {
        &self.state
    }

    /// Consecutive failures since the last successful connection or `start`.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The listening socket, present only while `Connected`.
    pub fn socket(&self) -> Option<&F::Socket> {
        self.socket.as_ref()
    }

    /// Mutable access to the listening socket, e.g. to accept connections.
    pub fn socket_mut(&mut self) -> Option<&mut F::Socket> {
        self.socket.as_mut()
    }

    /// Addressing of the current link, present only while `Connected`.
    pub fn link_info(&self) -> Option<&LinkInfo> {
        self.link.as_ref()
    }

    /// Most recent failure of any kind.
    pub fn last_failure(&self) -> Option<&FailureReason> {
        self.last_failure.as_ref()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.config.retry
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Take all status events recorded since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<StatusEvent> {
        self.events.drain(..).collect()
    }

    fn begin_attempt(&mut self) {
        let Some(credentials) = self.credentials.as_ref() else {
            return;
        };

        debug!(
            ssid = credentials.ssid(),
            attempt = self.attempts.saturating_add(1),
            "beginning association"
        );
        self.begin_error = self.radio.begin(credentials).err();
        self.attempt_started = self.clock.now();
        self.transition(ConnectionState::Associating);
    }

    fn poll_associating(&mut self) {
        if let Some(err) = self.begin_error.take() {
            self.fail_attempt(FailureReason::AssociationRejected { message: err.0 });
            return;
        }

        match self.radio.status() {
            LinkStatus::Up(link) => self.on_associated(link),
            LinkStatus::Rejected(message) => {
                self.fail_attempt(FailureReason::AssociationRejected { message })
            }
            LinkStatus::Pending | LinkStatus::Down => {
                let waited = self.clock.now().saturating_sub(self.attempt_started);
                if waited >= self.config.retry.association_timeout {
                    self.fail_attempt(FailureReason::AssociationTimeout);
                }
            }
        }
    }

    fn poll_connected(&mut self) {
        match self.radio.status() {
            LinkStatus::Up(link) => {
                if self.link.as_ref() != Some(&link) {
                    info!(ip = %link.ip, "link address changed");
                    self.link = Some(link);
                }
            }
            status => {
                debug!(?status, "link no longer up");
                self.fail_attempt(FailureReason::LinkLost);
            }
        }
    }

    fn poll_backoff(&mut self, until: Duration) {
        if self.config.retry.is_exhausted(self.attempts) {
            let reason = FailureReason::RetryLimitExceeded {
                attempts: self.attempts,
            };
            warn!(attempts = self.attempts, "giving up on connection");
            self.last_failure = Some(reason.clone());
            self.transition(ConnectionState::Failed(reason));
            return;
        }

        if self.clock.now() >= until {
            self.begin_attempt();
        }
    }

    fn on_associated(&mut self, link: LinkInfo) {
        let port = self.config.port;
        match self.sockets.bind(port) {
            Ok(socket) => {
                info!(
                    ip = %link.ip,
                    mac = %link.mac_string(),
                    port,
                    "WiFi connected, listening"
                );
                self.socket = Some(socket);
                self.link = Some(link);
                self.attempts = 0;
                self.transition(ConnectionState::Connected);
            }
            Err(err) => {
                warn!(port, error = %err.message, "failed to bind listening socket");
                self.radio.disconnect();
                let reason = FailureReason::SocketBindFailure {
                    port: err.port,
                    message: err.message,
                };
                self.last_failure = Some(reason.clone());
                self.transition(ConnectionState::Failed(reason));
            }
        }
    }

    /// Record a recoverable failure and schedule the next attempt.
    fn fail_attempt(&mut self, reason: FailureReason) {
        debug_assert!(reason.is_recoverable());
        self.radio.disconnect();
        self.attempts = self.attempts.saturating_add(1);

        let delay = self.config.retry.delay_for(self.attempts);
        warn!(
            error = %reason,
            attempts = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "connection attempt failed, backing off"
        );

        self.last_failure = Some(reason);
        let until = self.clock.now().saturating_add(delay);
        self.transition(ConnectionState::Backoff(until));
    }

    fn transition(&mut self, next: ConnectionState) {
        if !next.is_connected() {
            // Dropping the socket closes it.
            self.socket = None;
            self.link = None;
        }
        debug_assert_eq!(self.socket.is_some(), next.is_connected());

        debug!(from = self.state.name(), to = next.name(), "state transition");
        self.state = next;

        if self.config.event_capacity == 0 {
            return;
        }
        if self.events.len() == self.config.event_capacity {
            self.events.pop_front();
        }
        self.events.push_back(StatusEvent {
            state: self.state.clone(),
            at: self.clock.now(),
        });
    }
}
