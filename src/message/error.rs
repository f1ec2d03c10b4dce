use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while assembling a [`Message`](super::Message).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid address '{address}'")]
    InvalidAddress { address: String },
    #[error("message has no recipients")]
    NoRecipients,
    #[error("cannot read attachment '{}': {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
