//! Outbound delivery engines.
//!
//! Three strategies form a closed set: hand the whole recipient list to a
//! local relay, negotiate directly with each recipient's MX host, or submit
//! through an authenticated external relay. [`send`] dispatches on
//! [`Strategy`]; the individual engines are also exported for callers that
//! know their mode statically.

mod direct;
mod error;
mod options;
mod relay;
mod resolver;
mod session;
mod types;

pub use direct::send_direct;
pub use error::DeliveryError;
pub use options::{Credentials, DirectSendOptions, RelayOptions};
pub use relay::{send_authenticated, send_local};
pub use types::{DeliveryOutcome, DirectSendReport, OutcomeKind, RelayReceipt};

use crate::message::Message;

/// How to move a message out of this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Unauthenticated relay, typically a local test server.
    Local {
        host: String,
        port: u16,
        options: RelayOptions,
    },
    /// Direct delivery to each recipient's own mail server.
    Direct { options: DirectSendOptions },
    /// Authenticated relay through an external provider.
    Authenticated {
        host: String,
        port: u16,
        credentials: Credentials,
        options: RelayOptions,
    },
}

/// Result of [`send`]: a per-recipient report for direct delivery, a single
/// receipt for the relay strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Direct(DirectSendReport),
    Relay(RelayReceipt),
}

/// Dispatches one send over the chosen strategy. `log` receives progress
/// lines on the direct path; the relay paths report through their single
/// result.
pub fn send(
    strategy: &Strategy,
    sender: &str,
    recipients: &[String],
    message: &Message,
    log: impl FnMut(&str),
) -> Result<SendOutcome, DeliveryError> {
    match strategy {
        Strategy::Local {
            host,
            port,
            options,
        } => send_local(host, *port, sender, recipients, message, options)
            .map(SendOutcome::Relay),
        Strategy::Direct { options } => {
            send_direct(sender, recipients, message, options, log).map(SendOutcome::Direct)
        }
        Strategy::Authenticated {
            host,
            port,
            credentials,
            options,
        } => send_authenticated(host, *port, credentials, sender, recipients, message, options)
            .map(SendOutcome::Relay),
    }
}
