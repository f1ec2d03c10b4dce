//! Deliverable messages: builder, validation at build time, MIME rendering.

mod attachment;
mod error;
mod mime;

pub use attachment::Attachment;
pub use error::BuildError;

use std::path::PathBuf;

use crate::validator::validate_address;

/// An immutable, sendable message.
///
/// Invariant: the sender and every recipient passed syntactic validation when
/// the message was built, and all attachment bytes are already in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    sender: String,
    recipients: Vec<String>,
    cc: Vec<String>,
    subject: String,
    body: String,
    attachments: Vec<Attachment>,
}

impl Message {
    pub fn builder(sender: impl Into<String>) -> MessageBuilder {
        MessageBuilder::new(sender)
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn cc(&self) -> &[String] {
        &self.cc
    }

    /// Primary recipients followed by the Cc list — the full envelope.
    pub fn all_recipients(&self) -> Vec<String> {
        let mut all = self.recipients.clone();
        all.extend(self.cc.iter().cloned());
        all
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Renders the message as a `multipart/mixed` MIME document with CRLF
    /// line endings, ready for SMTP submission.
    pub fn to_wire_format(&self) -> String {
        mime::render(self)
    }
}

/// Assembles a [`Message`] from plain values.
///
/// Addresses are validated and attachment files are read when [`build`] is
/// called; any failure aborts the build and produces no partial message.
///
/// [`build`]: MessageBuilder::build
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    sender: String,
    to: Vec<String>,
    cc: Vec<String>,
    subject: String,
    body: String,
    attachment_paths: Vec<PathBuf>,
}

impl MessageBuilder {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            ..Self::default()
        }
    }

    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    pub fn cc(mut self, recipient: impl Into<String>) -> Self {
        self.cc.push(recipient.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn attach(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment_paths.push(path.into());
        self
    }

    pub fn build(self) -> Result<Message, BuildError> {
        if self.to.is_empty() {
            return Err(BuildError::NoRecipients);
        }
        for address in std::iter::once(&self.sender)
            .chain(self.to.iter())
            .chain(self.cc.iter())
        {
            if !validate_address(address) {
                return Err(BuildError::InvalidAddress {
                    address: address.clone(),
                });
            }
        }

        let mut attachments = Vec::with_capacity(self.attachment_paths.len());
        for path in &self.attachment_paths {
            attachments.push(Attachment::from_path(path)?);
        }

        Ok(Message {
            sender: self.sender,
            recipients: self.to,
            cc: self.cc,
            subject: self.subject,
            body: self.body,
            attachments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn scratch_file(name: &str, content: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("maildesk-test-{}-{name}", std::process::id()));
        fs::write(&path, content).expect("write scratch file");
        path
    }

    #[test]
    fn builds_plain_message() {
        let message = Message::builder("alice@example.com")
            .to("bob@example.org")
            .cc("carol@example.net")
            .subject("Greetings")
            .body("Hello")
            .build()
            .expect("valid message");
        assert_eq!(message.sender(), "alice@example.com");
        assert_eq!(
            message.all_recipients(),
            vec!["bob@example.org".to_string(), "carol@example.net".to_string()]
        );
        assert!(message.attachments().is_empty());
    }

    #[test]
    fn rejects_invalid_sender() {
        let err = Message::builder("not-an-address")
            .to("bob@example.org")
            .build()
            .expect_err("invalid sender");
        assert!(matches!(err, BuildError::InvalidAddress { address } if address == "not-an-address"));
    }

    #[test]
    fn rejects_invalid_cc() {
        let err = Message::builder("alice@example.com")
            .to("bob@example.org")
            .cc("b@d")
            .build()
            .expect_err("invalid cc");
        assert!(matches!(err, BuildError::InvalidAddress { address } if address == "b@d"));
    }

    #[test]
    fn requires_a_recipient() {
        let err = Message::builder("alice@example.com")
            .build()
            .expect_err("no recipients");
        assert!(matches!(err, BuildError::NoRecipients));
    }

    #[test]
    fn missing_attachment_aborts_build() {
        let err = Message::builder("alice@example.com")
            .to("bob@example.org")
            .attach("/nonexistent/definitely-missing.bin")
            .build()
            .expect_err("missing attachment");
        match err {
            BuildError::Attachment { path, .. } => {
                assert_eq!(path, Path::new("/nonexistent/definitely-missing.bin"));
            }
            other => panic!("expected attachment error, got {other:?}"),
        }
    }

    #[test]
    fn attachment_bytes_are_copied_at_build_time() {
        let path = scratch_file("copied.bin", b"original bytes");
        let message = Message::builder("alice@example.com")
            .to("bob@example.org")
            .attach(&path)
            .build()
            .expect("valid message");

        // Mutating the source file afterwards must not affect the message.
        fs::write(&path, b"changed").expect("rewrite scratch file");
        assert_eq!(message.attachments()[0].content, b"original bytes");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn wire_format_round_trips_through_mailparse() {
        let first = scratch_file("first.txt", b"attachment one");
        let second = scratch_file("second.bin", &[0u8, 159, 146, 150, 13, 10, 46]);
        let message = Message::builder("alice@example.com")
            .to("bob@example.org")
            .subject("Round trip")
            .body("Body line one\r\nBody line two")
            .attach(&first)
            .attach(&second)
            .build()
            .expect("valid message");

        let wire = message.to_wire_format();
        let parsed = mailparse::parse_mail(wire.as_bytes()).expect("well-formed MIME");

        use mailparse::MailHeaderMap;
        assert_eq!(
            parsed.headers.get_first_value("Subject").as_deref(),
            Some("Round trip")
        );
        assert_eq!(parsed.subparts.len(), 3);

        let body = parsed.subparts[0].get_body().expect("text part");
        assert_eq!(body.trim_end(), "Body line one\r\nBody line two".trim_end());

        for (index, attachment) in message.attachments().iter().enumerate() {
            let part = &parsed.subparts[index + 1];
            let disposition = part.get_content_disposition();
            assert_eq!(
                disposition.params.get("filename").map(String::as_str),
                Some(attachment.filename.as_str())
            );
            assert_eq!(
                part.get_body_raw().expect("decoded attachment"),
                attachment.content
            );
        }

        fs::remove_file(&first).ok();
        fs::remove_file(&second).ok();
    }
}
