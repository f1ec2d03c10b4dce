//! Turns a completed envelope into a [`ReceivedRecord`].

use std::net::SocketAddr;

use chrono::Local;
use mailparse::{MailHeaderMap, MailParseError, ParsedMail, parse_mail};

use super::session::Envelope;
use crate::store::ReceivedRecord;

/// Parses the raw message content of `envelope` and builds the record.
///
/// A parse failure propagates to the caller, which answers the client with a
/// permanent failure code and stores nothing.
pub(crate) fn record_from_envelope(
    envelope: &Envelope,
    peer: SocketAddr,
) -> Result<ReceivedRecord, MailParseError> {
    let parsed = parse_mail(envelope.data.as_bytes())?;

    let subject = parsed
        .headers
        .get_first_value("Subject")
        .unwrap_or_else(|| "No Subject".to_string());
    let body = extract_body(&parsed)?;

    Ok(ReceivedRecord {
        received_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        sender: envelope.sender.clone(),
        recipients: envelope.recipients.join(", "),
        subject,
        body,
        peer: peer.to_string(),
    })
}

/// Multipart messages yield the first `text/plain` part (empty when none
/// exists); anything else yields its single decoded payload.
fn extract_body(parsed: &ParsedMail<'_>) -> Result<String, MailParseError> {
    if parsed.subparts.is_empty() {
        return parsed.get_body();
    }
    match find_text_plain(parsed) {
        Some(part) => part.get_body(),
        None => Ok(String::new()),
    }
}

fn find_text_plain<'p, 'a>(part: &'p ParsedMail<'a>) -> Option<&'p ParsedMail<'a>> {
    if part.ctype.mimetype == "text/plain" && part.subparts.is_empty() {
        return Some(part);
    }
    part.subparts.iter().find_map(find_text_plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().expect("socket addr")
    }

    fn envelope(data: &str) -> Envelope {
        Envelope {
            sender: "alice@example.com".to_string(),
            recipients: vec!["bob@example.org".to_string(), "carol@example.net".to_string()],
            data: data.to_string(),
        }
    }

    #[test]
    fn plain_message_yields_subject_and_body() {
        let record = record_from_envelope(
            &envelope("Subject: Test\r\n\r\nHello\r\n"),
            peer(),
        )
        .expect("parsed");
        assert_eq!(record.subject, "Test");
        assert_eq!(record.body.trim_end(), "Hello");
        assert_eq!(record.sender, "alice@example.com");
        assert_eq!(record.recipients, "bob@example.org, carol@example.net");
        assert_eq!(record.peer, "127.0.0.1:50000");
    }

    #[test]
    fn missing_subject_defaults() {
        let record =
            record_from_envelope(&envelope("From: a@b.co\r\n\r\nBody only\r\n"), peer())
                .expect("parsed");
        assert_eq!(record.subject, "No Subject");
        assert_eq!(record.body.trim_end(), "Body only");
    }

    #[test]
    fn multipart_takes_first_text_plain_part() {
        let data = "Subject: Multi\r\n\
                    Content-Type: multipart/mixed; boundary=\"sep\"\r\n\
                    \r\n\
                    --sep\r\n\
                    Content-Type: application/octet-stream\r\n\
                    \r\n\
                    binary junk\r\n\
                    --sep\r\n\
                    Content-Type: text/plain; charset=utf-8\r\n\
                    \r\n\
                    the real body\r\n\
                    --sep--\r\n";
        let record = record_from_envelope(&envelope(data), peer()).expect("parsed");
        assert_eq!(record.body.trim_end(), "the real body");
    }

    #[test]
    fn multipart_without_text_plain_yields_empty_body() {
        let data = "Subject: None\r\n\
                    Content-Type: multipart/mixed; boundary=\"sep\"\r\n\
                    \r\n\
                    --sep\r\n\
                    Content-Type: application/octet-stream\r\n\
                    \r\n\
                    binary junk\r\n\
                    --sep--\r\n";
        let record = record_from_envelope(&envelope(data), peer()).expect("parsed");
        assert_eq!(record.body, "");
    }

    #[test]
    fn malformed_headers_fail_the_parse() {
        let err = record_from_envelope(&envelope("this line is not a header\r\n"), peer());
        assert!(err.is_err());
    }

    #[test]
    fn messages_built_by_this_crate_parse_back() {
        let message = Message::builder("alice@example.com")
            .to("bob@example.org")
            .subject("Loopback")
            .body("Round and round")
            .build()
            .expect("valid message");
        let record = record_from_envelope(&envelope(&message.to_wire_format()), peer())
            .expect("parsed");
        assert_eq!(record.subject, "Loopback");
        assert_eq!(record.body.trim_end(), "Round and round");
    }
}
