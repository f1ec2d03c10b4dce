use std::io;

use thiserror::Error;

/// Errors raised by the inbound listener lifecycle.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("listener is already running")]
    AlreadyRunning,
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}
