//! MIME wire-format rendering: a `multipart/mixed` document with one
//! `text/plain` part and one base64 part per attachment.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::Rng;
use rand::distributions::Alphanumeric;

use super::Message;

/// Base64 line width mandated for the content-transfer-encoded parts.
const BASE64_LINE_WIDTH: usize = 76;

/// Create a random MIME boundary.
fn make_boundary() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect()
}

/// Base64-encode `content`, wrapped at [`BASE64_LINE_WIDTH`] columns with
/// CRLF line endings.
fn encode_wrapped(content: &[u8]) -> String {
    let encoded = BASE64.encode(content);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_WIDTH * 2 + 2);
    for chunk in encoded.as_bytes().chunks(BASE64_LINE_WIDTH) {
        // chunks of an ASCII string are valid UTF-8
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push_str("\r\n");
    }
    out
}

pub(crate) fn render(message: &Message) -> String {
    let boundary = make_boundary();
    let mut out = String::new();

    out.push_str(&format!("From: {}\r\n", message.sender()));
    out.push_str(&format!("To: {}\r\n", message.recipients().join(", ")));
    if !message.cc().is_empty() {
        out.push_str(&format!("Cc: {}\r\n", message.cc().join(", ")));
    }
    out.push_str(&format!("Subject: {}\r\n", message.subject()));
    out.push_str(&format!("Date: {}\r\n", chrono::Utc::now().to_rfc2822()));
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str(&format!(
        "Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n"
    ));
    out.push_str("\r\n");

    out.push_str(&format!("--{boundary}\r\n"));
    out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
    out.push_str("Content-Transfer-Encoding: 8bit\r\n");
    out.push_str("\r\n");
    out.push_str(message.body());
    out.push_str("\r\n");

    for attachment in message.attachments() {
        out.push_str(&format!("--{boundary}\r\n"));
        out.push_str("Content-Type: application/octet-stream\r\n");
        out.push_str("Content-Transfer-Encoding: base64\r\n");
        out.push_str(&format!(
            "Content-Disposition: attachment; filename=\"{}\"\r\n",
            attachment.filename
        ));
        out.push_str("\r\n");
        out.push_str(&encode_wrapped(&attachment.content));
    }

    out.push_str(&format!("--{boundary}--\r\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_is_alphanumeric_and_long_enough() {
        let boundary = make_boundary();
        assert_eq!(boundary.len(), 40);
        assert!(boundary.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn base64_lines_stay_within_width() {
        let encoded = encode_wrapped(&[0xABu8; 400]);
        for line in encoded.lines() {
            assert!(line.len() <= BASE64_LINE_WIDTH);
        }
        let joined: String = encoded.lines().collect();
        assert_eq!(BASE64.decode(joined).unwrap(), vec![0xABu8; 400]);
    }
}
