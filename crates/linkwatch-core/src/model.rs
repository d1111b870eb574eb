//! Connection data model.
//!
//! These types are shared by the supervisor, the platform adapters and
//! anything that renders status for an operator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Maximum SSID length accepted by 802.11.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WPA2 passphrase length.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Errors raised when building [`Credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    /// The network identifier is empty.
    #[error("WiFi SSID cannot be empty")]
    EmptySsid,

    /// The network identifier is longer than 32 bytes.
    #[error("SSID too long ({0} bytes, max 32)")]
    SsidTooLong(usize),

    /// The secret is longer than 64 bytes.
    #[error("Password too long ({0} bytes, max 64)")]
    PasswordTooLong(usize),
}

/// Network identifier and secret used to associate.
///
/// Immutable once built. An empty password means an open network.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    ssid: String,
    password: String,
}

impl Credentials {
    /// Build validated credentials.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self, CredentialsError> {
        let ssid = ssid.into();
        let password = password.into();

        if ssid.is_empty() {
            return Err(CredentialsError::EmptySsid);
        }
        if ssid.len() > MAX_SSID_LEN {
            return Err(CredentialsError::SsidTooLong(ssid.len()));
        }
        if password.len() > MAX_PASSWORD_LEN {
            return Err(CredentialsError::PasswordTooLong(password.len()));
        }

        Ok(Self { ssid, password })
    }

    /// Network name.
    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Network secret (empty for open networks).
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Whether the network needs no authentication.
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &if self.is_open() { "" } else { "***" })
            .finish()
    }
}

/// Why the supervisor left the happy path.
///
/// The first three are recovered through backoff; the last two end the
/// cycle in [`ConnectionState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FailureReason {
    /// The radio did not associate within the attempt timeout.
    #[error("association timed out")]
    AssociationTimeout,

    /// The access point or the driver refused the association.
    #[error("association rejected: {message}")]
    AssociationRejected { message: String },

    /// An established link went down.
    #[error("link lost")]
    LinkLost,

    /// The listening socket could not be bound after associating.
    #[error("failed to bind port {port}: {message}")]
    SocketBindFailure { port: u16, message: String },

    /// Too many consecutive recoverable failures.
    #[error("retry limit exceeded after {attempts} attempts")]
    RetryLimitExceeded { attempts: u32 },
}

impl FailureReason {
    /// Whether the supervisor retries this failure on its own.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FailureReason::AssociationTimeout
                | FailureReason::AssociationRejected { .. }
                | FailureReason::LinkLost
        )
    }
}

/// Lifecycle state of the supervised connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "camelCase")]
pub enum ConnectionState {
    /// Nothing running, no socket.
    Idle,
    /// Waiting for the radio to join the network.
    Associating,
    /// Link up and listening socket bound.
    Connected,
    /// Terminal until the next `start`.
    Failed(FailureReason),
    /// Waiting until the given monotonic instant before re-associating.
    Backoff(Duration),
}

impl ConnectionState {
    /// Stable lowercase name for status lines.
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Associating => "associating",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed(_) => "failed",
            ConnectionState::Backoff(_) => "backoff",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// True while the supervisor is actively trying to get or stay online.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Associating | ConnectionState::Connected | ConnectionState::Backoff(_)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Failed(reason) => write!(f, "failed ({})", reason),
            ConnectionState::Backoff(until) => write!(f, "backoff (until {}ms)", until.as_millis()),
            other => f.write_str(other.name()),
        }
    }
}

/// Addressing details reported by the radio once associated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    /// Local address assigned to the station.
    pub ip: IpAddr,
    /// Station MAC address.
    pub mac: [u8; 6],
}

impl LinkInfo {
    /// MAC address in the usual colon-separated form.
    pub fn mac_string(&self) -> String {
        self.mac
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// One entry of the status stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// State entered.
    pub state: ConnectionState,
    /// Monotonic time of the transition.
    pub at: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_validation() {
        assert_eq!(Credentials::new("", "pw"), Err(CredentialsError::EmptySsid));
        assert_eq!(
            Credentials::new("x".repeat(33), ""),
            Err(CredentialsError::SsidTooLong(33))
        );
        assert_eq!(
            Credentials::new("lab", "p".repeat(65)),
            Err(CredentialsError::PasswordTooLong(65))
        );

        let creds = Credentials::new("x".repeat(32), "p".repeat(64)).unwrap();
        assert!(!creds.is_open());
        assert!(Credentials::new("lab", "").unwrap().is_open());
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = Credentials::new("lab-net", "hunter2").unwrap();
        let printed = format!("{:?}", creds);
        assert!(printed.contains("lab-net"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ConnectionState::Idle.name(), "idle");
        assert_eq!(ConnectionState::Backoff(Duration::from_secs(1)).name(), "backoff");
        assert_eq!(
            ConnectionState::Failed(FailureReason::LinkLost).to_string(),
            "failed (link lost)"
        );
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(ConnectionState::Failed(FailureReason::SocketBindFailure {
            port: 80,
            message: "in use".to_string(),
        }))
        .unwrap();

        assert_eq!(json["state"], "failed");
        assert_eq!(json["detail"]["kind"], "socketBindFailure");
        assert_eq!(json["detail"]["port"], 80);

        let json = serde_json::to_string(&ConnectionState::Connected).unwrap();
        assert_eq!(json, r#"{"state":"connected"}"#);
    }

    #[test]
    fn test_recoverable_failures() {
        assert!(FailureReason::AssociationTimeout.is_recoverable());
        assert!(FailureReason::LinkLost.is_recoverable());
        assert!(!FailureReason::RetryLimitExceeded { attempts: 3 }.is_recoverable());
        assert!(!FailureReason::SocketBindFailure {
            port: 80,
            message: String::new()
        }
        .is_recoverable());
    }

    #[test]
    fn test_mac_string() {
        let info = LinkInfo {
            ip: "192.168.1.20".parse().unwrap(),
            mac: [0x24, 0x6f, 0x28, 0x0a, 0xbc, 0x01],
        };
        assert_eq!(info.mac_string(), "24:6F:28:0A:BC:01");
    }
}
