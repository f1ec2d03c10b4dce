//! The two relay strategies: unauthenticated local relay and authenticated
//! external relay. Each is one synchronous transaction for the whole
//! recipient list.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use native_tls::TlsConnector;

use super::error::DeliveryError;
use super::options::{Credentials, RelayOptions};
use super::session::{SmtpReply, SmtpSession, StartTlsOutcome};
use super::types::RelayReceipt;
use crate::message::Message;

/// Hands the whole recipient list to a local relay: no authentication, no
/// encryption. Fails with [`DeliveryError::RecipientsRefused`] only when
/// every recipient was refused.
pub fn send_local(
    host: &str,
    port: u16,
    sender: &str,
    recipients: &[String],
    message: &Message,
    options: &RelayOptions,
) -> Result<RelayReceipt, DeliveryError> {
    let mut session = SmtpSession::connect(
        host,
        port,
        options.connect_timeout,
        options.command_timeout,
    )?;
    greet(&mut session, &options.helo_name)?;
    submit_envelope(&mut session, sender, recipients, &message.to_wire_format())
}

/// Hands the whole recipient list to an external relay after a mandatory
/// STARTTLS upgrade and `AUTH PLAIN`.
pub fn send_authenticated(
    host: &str,
    port: u16,
    credentials: &Credentials,
    sender: &str,
    recipients: &[String],
    message: &Message,
    options: &RelayOptions,
) -> Result<RelayReceipt, DeliveryError> {
    let mut session = SmtpSession::connect(
        host,
        port,
        options.connect_timeout,
        options.command_timeout,
    )?;
    let capabilities = greet(&mut session, &options.helo_name)?;

    // Unlike direct-send, encryption is not optional when credentials are on
    // the wire.
    if !capabilities.has_capability("STARTTLS") {
        session.quit();
        return Err(DeliveryError::StartTlsUnavailable {
            host: host.to_string(),
        });
    }
    let connector = TlsConnector::new().map_err(|source| DeliveryError::Tls {
        host: host.to_string(),
        source,
    })?;
    match session.starttls(&connector)? {
        StartTlsOutcome::Upgraded => {}
        StartTlsOutcome::Refused(reply) => {
            session.quit();
            return Err(DeliveryError::Protocol(format!(
                "STARTTLS refused: {}",
                reply.summary()
            )));
        }
    }
    let ehlo = format!("EHLO {}", options.helo_name);
    let reply = session.command(&ehlo)?;
    if !reply.is_positive_completion() {
        session.quit();
        return Err(DeliveryError::Protocol(format!(
            "EHLO over TLS rejected: {}",
            reply.summary()
        )));
    }

    let auth = format!("AUTH PLAIN {}", auth_plain_token(credentials));
    let reply = session.command(&auth)?;
    if reply.code != 235 {
        session.quit();
        return Err(DeliveryError::AuthenticationFailed {
            user: credentials.user.clone(),
            reply: reply.summary(),
        });
    }

    submit_envelope(&mut session, sender, recipients, &message.to_wire_format())
}

/// `AUTH PLAIN` initial response: base64 of `\0user\0password`.
fn auth_plain_token(credentials: &Credentials) -> String {
    BASE64.encode(format!(
        "\0{}\0{}",
        credentials.user, credentials.password
    ))
}

/// Reads the banner and sends EHLO, returning the advertised capabilities.
fn greet(session: &mut SmtpSession, helo_name: &str) -> Result<SmtpReply, DeliveryError> {
    let banner = session.read_banner()?;
    if !banner.is_positive_completion() {
        return Err(DeliveryError::Protocol(format!(
            "unexpected greeting: {}",
            banner.summary()
        )));
    }
    let reply = session.command(&format!("EHLO {helo_name}"))?;
    if !reply.is_positive_completion() {
        session.quit();
        return Err(DeliveryError::Protocol(format!(
            "EHLO rejected: {}",
            reply.summary()
        )));
    }
    Ok(reply)
}

/// MAIL FROM, RCPT TO for every recipient, DATA, QUIT. smtplib semantics:
/// the transaction proceeds while at least one recipient is accepted.
fn submit_envelope(
    session: &mut SmtpSession,
    sender: &str,
    recipients: &[String],
    wire: &str,
) -> Result<RelayReceipt, DeliveryError> {
    let reply = session.command(&format!("MAIL FROM:<{sender}>"))?;
    if !reply.is_positive_completion() {
        session.quit();
        return Err(DeliveryError::SenderRefused {
            sender: sender.to_string(),
            reply: reply.summary(),
        });
    }

    let mut accepted = 0usize;
    let mut refused = Vec::new();
    for recipient in recipients {
        let reply = session.command(&format!("RCPT TO:<{recipient}>"))?;
        if reply.is_positive_completion() {
            accepted += 1;
        } else {
            refused.push(format!("{recipient}: {}", reply.summary()));
        }
    }
    if accepted == 0 {
        session.quit();
        return Err(DeliveryError::RecipientsRefused { replies: refused });
    }

    let reply = session.submit_body(wire)?;
    if !reply.is_positive_completion() {
        session.quit();
        return Err(DeliveryError::Protocol(format!(
            "message rejected: {}",
            reply.summary()
        )));
    }

    let receipt = RelayReceipt {
        accepted,
        reply: reply.summary(),
    };
    session.quit();
    Ok(receipt)
}
