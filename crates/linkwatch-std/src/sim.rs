//! Simulated radio for running the supervisor on a host without WiFi
//! hardware.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tracing::{debug, info};

use linkwatch_core::{Clock, Credentials, LinkInfo, LinkStatus, Radio, RadioError};

use crate::clock::SystemClock;

/// Behavior of a [`SimulatedRadio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationPlan {
    /// Time from `begin` until the link comes up.
    pub association_delay: Duration,
    /// Number of initial attempts refused by the "access point".
    pub reject_first: u32,
    /// Only this SSID is "in range"; any SSID if `None`.
    pub visible_ssid: Option<String>,
    /// Address handed out once associated.
    pub link: LinkInfo,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            association_delay: Duration::from_millis(1500),
            reject_first: 0,
            visible_ssid: None,
            link: LinkInfo {
                ip: IpAddr::V4(Ipv4Addr::new(192, 168, 4, 2)),
                mac: [0x02, 0x00, 0x00, 0x4c, 0x57, 0x01],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SimState {
    Down,
    Joining { since: Duration },
    Refused(String),
    Up,
}

/// Radio driver that follows a [`SimulationPlan`].
#[derive(Debug)]
pub struct SimulatedRadio<C: Clock = SystemClock> {
    plan: SimulationPlan,
    clock: C,
    state: SimState,
    begins: u32,
}

impl SimulatedRadio<SystemClock> {
    pub fn new(plan: SimulationPlan) -> Self {
        Self::with_clock(plan, SystemClock::new())
    }
}

impl<C: Clock> SimulatedRadio<C> {
    pub fn with_clock(plan: SimulationPlan, clock: C) -> Self {
        Self {
            plan,
            clock,
            state: SimState::Down,
            begins: 0,
        }
    }

    /// Drop an established link, as if the access point went away.
    pub fn drop_link(&mut self) {
        if self.state == SimState::Up {
            info!("simulated link drop");
            self.state = SimState::Down;
        }
    }

    /// Number of association attempts started so far.
    pub fn begins(&self) -> u32 {
        self.begins
    }

    pub fn plan(&self) -> &SimulationPlan {
        &self.plan
    }
}

impl<C: Clock> Radio for SimulatedRadio<C> {
    fn begin(&mut self, credentials: &Credentials) -> Result<(), RadioError> {
        self.begins += 1;
        debug!(ssid = credentials.ssid(), attempt = self.begins, "simulated begin");

        if let Some(visible) = &self.plan.visible_ssid {
            if visible != credentials.ssid() {
                self.state = SimState::Refused(format!("network '{}' not found", credentials.ssid()));
                return Ok(());
            }
        }

        self.state = if self.begins <= self.plan.reject_first {
            SimState::Refused("authentication failed".to_string())
        } else {
            SimState::Joining {
                since: self.clock.now(),
            }
        };
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        if let SimState::Joining { since } = self.state {
            if self.clock.now().saturating_sub(since) >= self.plan.association_delay {
                self.state = SimState::Up;
            }
        }

        match &self.state {
            SimState::Down => LinkStatus::Down,
            SimState::Joining { .. } => LinkStatus::Pending,
            SimState::Refused(reason) => LinkStatus::Rejected(reason.clone()),
            SimState::Up => LinkStatus::Up(self.plan.link.clone()),
        }
    }

    fn disconnect(&mut self) {
        self.state = SimState::Down;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct ManualClock(Rc<Cell<Duration>>);

    impl Clock for ManualClock {
        fn now(&self) -> Duration {
            self.0.get()
        }
    }

    fn creds(ssid: &str) -> Credentials {
        Credentials::new(ssid, "secret").unwrap()
    }

    #[test]
    fn test_joins_after_delay() {
        let clock = ManualClock::default();
        let plan = SimulationPlan {
            association_delay: Duration::from_secs(2),
            ..Default::default()
        };
        let mut radio = SimulatedRadio::with_clock(plan, clock.clone());

        assert_eq!(radio.status(), LinkStatus::Down);
        radio.begin(&creds("lab-net")).unwrap();
        assert_eq!(radio.status(), LinkStatus::Pending);

        clock.0.set(Duration::from_secs(2));
        assert!(matches!(radio.status(), LinkStatus::Up(_)));

        radio.drop_link();
        assert_eq!(radio.status(), LinkStatus::Down);
    }

    #[test]
    fn test_rejects_first_attempts() {
        let plan = SimulationPlan {
            association_delay: Duration::ZERO,
            reject_first: 2,
            ..Default::default()
        };
        let mut radio = SimulatedRadio::with_clock(plan, ManualClock::default());

        for _ in 0..2 {
            radio.begin(&creds("lab-net")).unwrap();
            assert!(matches!(radio.status(), LinkStatus::Rejected(_)));
        }
        radio.begin(&creds("lab-net")).unwrap();
        assert!(matches!(radio.status(), LinkStatus::Up(_)));
        assert_eq!(radio.begins(), 3);
    }

    #[test]
    fn test_unknown_network() {
        let plan = SimulationPlan {
            visible_ssid: Some("lab-net".to_string()),
            ..Default::default()
        };
        let mut radio = SimulatedRadio::with_clock(plan, ManualClock::default());

        radio.begin(&creds("other")).unwrap();
        assert_eq!(
            radio.status(),
            LinkStatus::Rejected("network 'other' not found".to_string())
        );
    }
}
