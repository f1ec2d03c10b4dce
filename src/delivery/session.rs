//! Blocking SMTP client session, optionally upgraded to TLS via STARTTLS.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use native_tls::{HandshakeError, TlsConnector, TlsStream};
use tracing::debug;

use super::error::DeliveryError;

#[derive(Debug, Clone)]
pub(crate) struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }

    /// True when any reply line advertises `cap` as its first token, the way
    /// EHLO responses list extensions.
    pub fn has_capability(&self, cap: &str) -> bool {
        self.lines.iter().any(|line| {
            line.split_whitespace()
                .next()
                .map(|token| token.eq_ignore_ascii_case(cap))
                .unwrap_or(false)
        })
    }

    pub fn text(&self) -> String {
        self.lines.join(" ")
    }

    /// `"code text"`, for log lines and error details.
    pub fn summary(&self) -> String {
        format!("{} {}", self.code, self.text())
    }
}

#[derive(Debug)]
enum StreamState {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    Invalid,
}

/// Outcome of a STARTTLS attempt whose command round-trip succeeded.
#[derive(Debug)]
pub(crate) enum StartTlsOutcome {
    /// The session now runs over TLS.
    Upgraded,
    /// The server refused the STARTTLS command; the session continues in
    /// plaintext.
    Refused(SmtpReply),
}

/// One SMTP client session. The socket is owned by the session and closed on
/// drop, whichever way the transaction ends.
pub(crate) struct SmtpSession {
    host: String,
    state: StreamState,
    buffer: Vec<u8>,
    command_timeout: Duration,
    transcript: Vec<String>,
}

impl SmtpSession {
    /// Connects to `host:port`, trying every resolved socket address before
    /// giving up. Read/write timeouts apply to every later command.
    pub fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let target = format!("{host}:{port}");
        let addrs: Vec<SocketAddr> = target
            .to_socket_addrs()
            .map_err(|source| DeliveryError::Connect {
                host: target.clone(),
                source,
            })?
            .collect();

        let mut last_err = None;
        for addr in &addrs {
            match TcpStream::connect_timeout(addr, connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(command_timeout))
                        .map_err(|source| DeliveryError::Io { source })?;
                    stream
                        .set_write_timeout(Some(command_timeout))
                        .map_err(|source| DeliveryError::Io { source })?;
                    return Ok(Self {
                        host: host.to_string(),
                        state: StreamState::Plain(stream),
                        buffer: Vec::new(),
                        command_timeout,
                        transcript: Vec::new(),
                    });
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(DeliveryError::Connect {
            host: target,
            source: last_err.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, "no socket address resolved")
            }),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Reads the server greeting sent on connect.
    pub fn read_banner(&mut self) -> Result<SmtpReply, DeliveryError> {
        let reply = self.read_reply()?;
        self.record_reply(&reply);
        Ok(reply)
    }

    /// Sends one command line and reads the reply.
    pub fn command(&mut self, command: &str) -> Result<SmtpReply, DeliveryError> {
        self.record("C", command);
        self.send_line(command)?;
        let reply = self.read_reply()?;
        self.record_reply(&reply);
        Ok(reply)
    }

    /// Attempts the in-session TLS upgrade. A refused command leaves the
    /// plaintext session usable; a failed handshake consumes the socket and
    /// surfaces as [`DeliveryError::Tls`].
    pub fn starttls(&mut self, connector: &TlsConnector) -> Result<StartTlsOutcome, DeliveryError> {
        let reply = self.command("STARTTLS")?;
        if !reply.is_positive_completion() {
            return Ok(StartTlsOutcome::Refused(reply));
        }

        let mut state = StreamState::Invalid;
        std::mem::swap(&mut self.state, &mut state);
        let plain = match state {
            StreamState::Plain(stream) => stream,
            StreamState::Tls(stream) => {
                self.state = StreamState::Tls(stream);
                return Ok(StartTlsOutcome::Upgraded);
            }
            StreamState::Invalid => {
                return Err(DeliveryError::Protocol("invalid stream state".into()));
            }
        };

        let mut tls = complete_handshake(connector, &self.host, plain)?;
        tls.get_mut()
            .set_read_timeout(Some(self.command_timeout))
            .map_err(|source| DeliveryError::Io { source })?;
        tls.get_mut()
            .set_write_timeout(Some(self.command_timeout))
            .map_err(|source| DeliveryError::Io { source })?;
        self.state = StreamState::Tls(Box::new(tls));
        // Leftover plaintext bytes must not leak into the TLS session.
        self.buffer.clear();
        Ok(StartTlsOutcome::Upgraded)
    }

    /// Runs the DATA phase: issues the command, expects `354`, writes the
    /// dot-stuffed payload and returns the final reply.
    pub fn submit_body(&mut self, wire: &str) -> Result<SmtpReply, DeliveryError> {
        let reply = self.command("DATA")?;
        if !reply.is_intermediate() {
            return Err(DeliveryError::Protocol(format!(
                "DATA rejected: {}",
                reply.summary()
            )));
        }
        self.record("C", "<message content>");
        self.write_all(dot_stuff(wire).as_bytes())?;
        let reply = self.read_reply()?;
        self.record_reply(&reply);
        Ok(reply)
    }

    /// Best-effort QUIT; errors are ignored because the socket is torn down
    /// either way.
    pub fn quit(&mut self) {
        self.record("C", "QUIT");
        if self.send_line("QUIT").is_ok() {
            if let Ok(reply) = self.read_reply() {
                self.record_reply(&reply);
            }
        }
    }

    pub fn take_transcript(&mut self) -> Vec<String> {
        std::mem::take(&mut self.transcript)
    }

    fn record(&mut self, direction: &str, message: &str) {
        debug!(host = %self.host, "{direction}: {message}");
        self.transcript
            .push(format!("[{}] {direction}: {message}", self.host));
    }

    fn record_reply(&mut self, reply: &SmtpReply) {
        if reply.lines.is_empty() {
            let code = reply.code.to_string();
            self.record("S", &code);
        } else {
            for line in &reply.lines {
                self.record("S", &format!("{} {line}", reply.code));
            }
        }
    }

    fn send_line(&mut self, line: &str) -> Result<(), DeliveryError> {
        let mut data = line.as_bytes().to_vec();
        data.extend_from_slice(b"\r\n");
        self.write_all(&data)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), DeliveryError> {
        let stream: &mut dyn Write = match &mut self.state {
            StreamState::Plain(stream) => stream,
            StreamState::Tls(stream) => stream.as_mut(),
            StreamState::Invalid => {
                return Err(DeliveryError::Protocol("invalid stream state".into()));
            }
        };
        stream
            .write_all(data)
            .and_then(|()| stream.flush())
            .map_err(|source| DeliveryError::Io { source })
    }

    fn read_reply(&mut self) -> Result<SmtpReply, DeliveryError> {
        let mut lines = Vec::new();
        let mut code: Option<u16> = None;
        loop {
            let line = self.read_line()?;
            if line.len() < 3 {
                return Err(DeliveryError::Protocol(format!("invalid reply: {line}")));
            }
            let parsed_code = line[..3].parse::<u16>().map_err(|_| {
                DeliveryError::Protocol(format!("invalid code in line: {line}"))
            })?;
            if let Some(existing) = code {
                if existing != parsed_code {
                    return Err(DeliveryError::Protocol(format!(
                        "inconsistent reply codes: {existing} vs {parsed_code}"
                    )));
                }
            } else {
                code = Some(parsed_code);
            }
            let is_last = !line.as_bytes().get(3).map(|b| *b == b'-').unwrap_or(false);
            let text = if line.len() > 4 {
                line[4..].to_string()
            } else {
                String::new()
            };
            lines.push(text);
            if is_last {
                break;
            }
        }
        Ok(SmtpReply {
            code: code.unwrap_or(0),
            lines,
        })
    }

    fn read_line(&mut self) -> Result<String, DeliveryError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let mut line = self.buffer.drain(..=pos).collect::<Vec<_>>();
                if line.ends_with(b"\r\n") {
                    line.truncate(line.len() - 2);
                } else if line.ends_with(b"\n") {
                    line.truncate(line.len() - 1);
                }
                return String::from_utf8(line)
                    .map_err(|err| DeliveryError::Protocol(format!("utf8 error: {err}")));
            }

            let mut buf = [0u8; 512];
            let read = match &mut self.state {
                StreamState::Plain(stream) => stream.read(&mut buf),
                StreamState::Tls(stream) => stream.read(&mut buf),
                StreamState::Invalid => {
                    return Err(DeliveryError::Protocol("invalid stream state".into()));
                }
            };
            let read = read.map_err(|source| DeliveryError::Io { source })?;
            if read == 0 {
                return Err(DeliveryError::Io {
                    source: io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"),
                });
            }
            self.buffer.extend_from_slice(&buf[..read]);
        }
    }
}

fn complete_handshake(
    connector: &TlsConnector,
    host: &str,
    stream: TcpStream,
) -> Result<TlsStream<TcpStream>, DeliveryError> {
    match connector.connect(host, stream) {
        Ok(tls) => Ok(tls),
        Err(HandshakeError::Failure(source)) => Err(DeliveryError::Tls {
            host: host.to_string(),
            source,
        }),
        Err(HandshakeError::WouldBlock(mut mid)) => loop {
            match mid.handshake() {
                Ok(tls) => break Ok(tls),
                Err(HandshakeError::Failure(source)) => {
                    break Err(DeliveryError::Tls {
                        host: host.to_string(),
                        source,
                    });
                }
                Err(HandshakeError::WouldBlock(next)) => mid = next,
            }
        },
    }
}

/// Escapes leading dots and terminates the payload with `CRLF . CRLF`.
pub(crate) fn dot_stuff(payload: &str) -> String {
    let trimmed = payload.strip_suffix("\r\n").unwrap_or(payload);
    let mut out = String::with_capacity(trimmed.len() + 8);
    for line in trimmed.split("\r\n") {
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out.push_str(".\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(code: u16, lines: &[&str]) -> SmtpReply {
        SmtpReply {
            code,
            lines: lines.iter().map(|line| line.to_string()).collect(),
        }
    }

    #[test]
    fn reply_classification() {
        assert!(reply(250, &["Ok"]).is_positive_completion());
        assert!(reply(354, &["go ahead"]).is_intermediate());
        assert!(reply(550, &["no"]).is_permanent_failure());
        assert!(!reply(421, &["later"]).is_positive_completion());
    }

    #[test]
    fn capability_lookup_is_case_insensitive() {
        let ehlo = reply(250, &["mail.example.org", "STARTTLS", "SIZE 35882577"]);
        assert!(ehlo.has_capability("starttls"));
        assert!(ehlo.has_capability("SIZE"));
        assert!(!ehlo.has_capability("AUTH"));
    }

    #[test]
    fn summary_joins_code_and_text() {
        assert_eq!(reply(550, &["User", "unknown"]).summary(), "550 User unknown");
    }

    #[test]
    fn dot_stuffing_escapes_leading_dots() {
        let stuffed = dot_stuff("line one\r\n.hidden\r\n..double\r\n");
        assert_eq!(stuffed, "line one\r\n..hidden\r\n...double\r\n.\r\n");
    }

    #[test]
    fn dot_stuffing_terminates_unterminated_payload() {
        assert_eq!(dot_stuff("body"), "body\r\n.\r\n");
    }
}
