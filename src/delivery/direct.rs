//! Direct-to-recipient delivery: MX resolution, per-recipient negotiation
//! with port fallback and opportunistic STARTTLS, partial-failure accounting.

use native_tls::TlsConnector;
use tracing::debug;

use super::error::DeliveryError;
use super::options::DirectSendOptions;
use super::resolver::{self, LookupMx};
use super::session::{SmtpSession, StartTlsOutcome};
use super::types::{DeliveryOutcome, DirectSendReport, OutcomeKind};
use crate::message::Message;
use trust_dns_resolver::Resolver;

/// Delivers `message` to each recipient's own mail server, one at a time.
///
/// The batch is not atomic: every recipient gets an independent outcome and a
/// failure never aborts the loop. Progress lines go to `log` before the next
/// recipient starts. The only batch-level error is a resolver that cannot be
/// initialized at all.
pub fn send_direct(
    sender: &str,
    recipients: &[String],
    message: &Message,
    options: &DirectSendOptions,
    log: impl FnMut(&str),
) -> Result<DirectSendReport, DeliveryError> {
    let resolver = Resolver::from_system_conf()
        .map_err(|source| DeliveryError::ResolverInit { source })?;
    Ok(send_direct_with_resolver(
        sender, recipients, message, options, &resolver, log,
    ))
}

pub(crate) fn send_direct_with_resolver<R: LookupMx>(
    sender: &str,
    recipients: &[String],
    message: &Message,
    options: &DirectSendOptions,
    resolver: &R,
    mut log: impl FnMut(&str),
) -> DirectSendReport {
    let connector = match TlsConnector::new() {
        Ok(connector) => Some(connector),
        Err(err) => {
            log(&format!(
                "TLS unavailable, sessions stay unencrypted: {err}"
            ));
            None
        }
    };

    let wire = message.to_wire_format();
    let mut report = DirectSendReport::default();

    for recipient in recipients {
        let outcome = match deliver_one(
            sender,
            recipient,
            &wire,
            options,
            resolver,
            connector.as_ref(),
            &mut log,
        ) {
            Ok(()) => {
                log(&format!("sent to {recipient}"));
                DeliveryOutcome {
                    recipient: recipient.clone(),
                    kind: OutcomeKind::Sent,
                    detail: "delivered".to_string(),
                }
            }
            Err(err) => {
                let outcome = classify(recipient, err);
                log(&format!("failed {}: {}", outcome.recipient, outcome.detail));
                outcome
            }
        };
        report.record(outcome);
    }

    report
}

fn deliver_one<R: LookupMx>(
    sender: &str,
    recipient: &str,
    wire: &str,
    options: &DirectSendOptions,
    resolver: &R,
    connector: Option<&TlsConnector>,
    log: &mut impl FnMut(&str),
) -> Result<(), DeliveryError> {
    let domain = recipient
        .split_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
        .ok_or_else(|| {
            DeliveryError::Protocol(format!("recipient '{recipient}' has no domain"))
        })?;

    log(&format!("looking up MX records for {domain}"));
    let host = resolver::best_exchange(resolver, domain)?;

    log(&format!(
        "connecting to {host}:{} for {recipient}",
        options.primary_port
    ));

    let mut attempt_tls = connector.is_some();
    loop {
        let result = submit(
            sender,
            recipient,
            wire,
            &host,
            options,
            if attempt_tls { connector } else { None },
            log,
        );
        match result {
            // A failed TLS handshake consumes the socket; redial the same
            // host once with STARTTLS disabled rather than fail the
            // recipient for an encryption problem.
            Err(DeliveryError::Tls { .. }) if attempt_tls => {
                log(&format!(
                    "TLS upgrade with {host} failed, retrying unencrypted"
                ));
                attempt_tls = false;
            }
            other => return other,
        }
    }
}

/// Opens the connection (with the 25→587 fallback), runs the transaction and
/// drains the transcript into the log sink when tracing is on.
fn submit(
    sender: &str,
    recipient: &str,
    wire: &str,
    host: &str,
    options: &DirectSendOptions,
    connector: Option<&TlsConnector>,
    log: &mut impl FnMut(&str),
) -> Result<(), DeliveryError> {
    let mut session = connect_with_fallback(host, options, log)?;
    let result = transact(&mut session, sender, recipient, wire, options, connector);
    if options.protocol_trace {
        for line in session.take_transcript() {
            log(&line);
        }
    }
    result
}

fn connect_with_fallback(
    host: &str,
    options: &DirectSendOptions,
    log: &mut impl FnMut(&str),
) -> Result<SmtpSession, DeliveryError> {
    match SmtpSession::connect(
        host,
        options.primary_port,
        options.connect_timeout,
        options.command_timeout,
    ) {
        Ok(session) => Ok(session),
        Err(DeliveryError::Connect { source: first, .. }) => {
            debug!(
                "port {} unreachable ({first}), trying {}",
                options.primary_port, options.fallback_port
            );
            log(&format!(
                "port {} failed, trying port {}",
                options.primary_port, options.fallback_port
            ));
            SmtpSession::connect(
                host,
                options.fallback_port,
                options.connect_timeout,
                options.command_timeout,
            )
            .map_err(|err| match err {
                DeliveryError::Connect { source, .. } => DeliveryError::Connect {
                    host: format!(
                        "{host} (ports {} and {})",
                        options.primary_port, options.fallback_port
                    ),
                    source,
                },
                other => other,
            })
        }
        Err(other) => Err(other),
    }
}

fn transact(
    session: &mut SmtpSession,
    sender: &str,
    recipient: &str,
    wire: &str,
    options: &DirectSendOptions,
    connector: Option<&TlsConnector>,
) -> Result<(), DeliveryError> {
    let banner = session.read_banner()?;
    if !banner.is_positive_completion() {
        return Err(DeliveryError::Protocol(format!(
            "unexpected greeting: {}",
            banner.summary()
        )));
    }

    let ehlo = format!("EHLO {}", options.helo_name);
    let mut capabilities = session.command(&ehlo)?;
    if !capabilities.is_positive_completion() {
        session.quit();
        return Err(DeliveryError::Protocol(format!(
            "EHLO rejected: {}",
            capabilities.summary()
        )));
    }

    if let Some(connector) = connector {
        if capabilities.has_capability("STARTTLS") {
            match session.starttls(connector)? {
                StartTlsOutcome::Upgraded => {
                    capabilities = session.command(&ehlo)?;
                    if !capabilities.is_positive_completion() {
                        session.quit();
                        return Err(DeliveryError::Protocol(format!(
                            "EHLO over TLS rejected: {}",
                            capabilities.summary()
                        )));
                    }
                }
                StartTlsOutcome::Refused(reply) => {
                    debug!(host = session.host(), "STARTTLS refused: {}", reply.summary());
                }
            }
        }
    }

    let reply = session.command(&format!("MAIL FROM:<{sender}>"))?;
    if !reply.is_positive_completion() {
        session.quit();
        return Err(DeliveryError::SenderRefused {
            sender: sender.to_string(),
            reply: reply.summary(),
        });
    }

    let reply = session.command(&format!("RCPT TO:<{recipient}>"))?;
    if reply.is_permanent_failure() {
        session.quit();
        return Err(DeliveryError::RecipientsRefused {
            replies: vec![format!("{recipient}: {}", reply.summary())],
        });
    }
    if !reply.is_positive_completion() {
        session.quit();
        return Err(DeliveryError::Protocol(format!(
            "RCPT TO temporary failure: {}",
            reply.summary()
        )));
    }

    let reply = session.submit_body(wire)?;
    if !reply.is_positive_completion() {
        session.quit();
        return Err(DeliveryError::Protocol(format!(
            "message rejected: {}",
            reply.summary()
        )));
    }

    session.quit();
    Ok(())
}

fn classify(recipient: &str, err: DeliveryError) -> DeliveryOutcome {
    let (kind, detail) = match &err {
        DeliveryError::Connect { .. } => (
            OutcomeKind::ConnectionFailed,
            format!("{err} (outbound port 25 is often blocked)"),
        ),
        DeliveryError::SenderRefused { .. } | DeliveryError::RecipientsRefused { .. } => (
            OutcomeKind::Refused,
            format!("{err} (the server likely requires authentication)"),
        ),
        _ => (OutcomeKind::Other, err.to_string()),
    };
    DeliveryOutcome {
        recipient: recipient.to_string(),
        kind,
        detail,
    }
}
