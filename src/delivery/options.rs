use std::time::Duration;

/// The fixed, generic identity announced in `EHLO`. Direct-send deliberately
/// does not reveal the real local hostname.
pub(crate) const DEFAULT_HELO_NAME: &str = "localhost.localdomain";

/// Configuration knobs for [`send_direct`](super::send_direct).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectSendOptions {
    pub helo_name: String,
    /// Applied per connection attempt, never per batch.
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub primary_port: u16,
    /// Tried once when the primary port cannot be reached; many networks
    /// block outbound 25 but permit 587.
    pub fallback_port: u16,
    /// Routes the full session transcript to the progress sink.
    pub protocol_trace: bool,
}

impl Default for DirectSendOptions {
    fn default() -> Self {
        Self {
            helo_name: DEFAULT_HELO_NAME.to_string(),
            connect_timeout: Duration::from_secs(20),
            command_timeout: Duration::from_secs(20),
            primary_port: 25,
            fallback_port: 587,
            protocol_trace: false,
        }
    }
}

/// Configuration knobs for the relay strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOptions {
    pub helo_name: String,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            helo_name: DEFAULT_HELO_NAME.to_string(),
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
        }
    }
}

/// Credentials for the authenticated relay strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}
