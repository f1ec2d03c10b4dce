use thiserror::Error;

/// Errors raised by the outbound delivery engines.
///
/// On the direct-send path these never escape: the engine converts them into
/// per-recipient [`DeliveryOutcome`](super::DeliveryOutcome)s. The relay
/// strategies propagate them as the single result of their one transaction.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("domain '{domain}' could not be converted to ASCII")]
    IdnaConversion {
        domain: String,
        #[source]
        source: idna::Errors,
    },
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: std::io::Error,
    },
    #[error("MX lookup for '{domain}' failed: {source}")]
    Resolve {
        domain: String,
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
    #[error("no mail server found for '{domain}'")]
    NoMailServer { domain: String },
    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("TLS handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: native_tls::Error,
    },
    #[error("STARTTLS not offered by {host}")]
    StartTlsUnavailable { host: String },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("sender '{sender}' refused: {reply}")]
    SenderRefused { sender: String, reply: String },
    #[error("recipient(s) refused: {}", replies.join("; "))]
    RecipientsRefused { replies: Vec<String> },
    #[error("authentication for '{user}' rejected: {reply}")]
    AuthenticationFailed { user: String, reply: String },
}
