//! Inbound SMTP endpoint: a minimal receiving server for local testing.
//!
//! No authentication and no TLS — every sender and recipient is accepted.
//! Completed envelopes are parsed and shipped as [`ListenerEvent`]s over an
//! `mpsc` channel; the consumer on the other end owns the record store.

mod control;
mod error;
mod parser;
mod server;
mod session;

pub use control::{Listener, ListenerState};
pub use error::InboundError;
pub use server::ListenerEvent;
pub use session::{Envelope, Session, SessionState, Step};

#[cfg(test)]
mod tests;
