//! Per-connection SMTP session state machine.
//!
//! The machine is pure: it consumes command lines and yields replies plus
//! completed envelopes, leaving all socket and channel I/O to the server
//! loop. A rejected command never changes the session state.

/// Name announced in the greeting and HELO/EHLO replies.
pub(crate) const SERVER_NAME: &str = "maildesk";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection established, greeting sent, no HELO/EHLO yet.
    Connected,
    /// HELO/EHLO received; ready for a mail transaction.
    Greeted,
    /// MAIL FROM accepted.
    MailFrom,
    /// At least one RCPT TO accepted; more may follow, or DATA.
    RcptTo,
    /// Collecting message content until the lone dot.
    Data,
}

/// A completed envelope: addressing metadata plus the raw message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub sender: String,
    pub recipients: Vec<String>,
    pub data: String,
}

/// What the server loop should do after feeding one line to the session.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// Write the reply and keep reading.
    Reply(String),
    /// Write the reply and close the connection.
    Quit(String),
    /// A data line was absorbed; nothing to write.
    Collected,
    /// The DATA phase completed; parse the envelope, then reply 250 or 550.
    Envelope(Envelope),
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
    sender: String,
    recipients: Vec<String>,
    data: String,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Connected,
            sender: String::new(),
            recipients: Vec::new(),
            data: String::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn greeting() -> String {
        format!("220 {SERVER_NAME} SMTP service ready")
    }

    /// True while the session is inside the DATA phase, where even blank
    /// lines are content.
    pub fn collecting_data(&self) -> bool {
        self.state == SessionState::Data
    }

    pub fn process_line(&mut self, line: &str) -> Step {
        if self.state == SessionState::Data {
            return self.process_data_line(line);
        }

        let upper = line.to_uppercase();
        if upper.starts_with("QUIT") {
            return Step::Quit("221 Bye".to_string());
        }
        if upper.starts_with("NOOP") {
            return Step::Reply("250 OK".to_string());
        }
        if upper.starts_with("RSET") {
            self.reset_transaction();
            return Step::Reply("250 OK".to_string());
        }

        match self.state {
            SessionState::Connected => {
                if upper.starts_with("HELO") || upper.starts_with("EHLO") {
                    self.state = SessionState::Greeted;
                    Step::Reply(format!("250 {SERVER_NAME}"))
                } else {
                    Step::Reply("503 Bad sequence of commands (expected HELO/EHLO)".to_string())
                }
            }
            SessionState::Greeted => {
                if upper.starts_with("HELO") || upper.starts_with("EHLO") {
                    Step::Reply(format!("250 {SERVER_NAME}"))
                } else if upper.starts_with("MAIL FROM:") {
                    match extract_address(line) {
                        Some(address) => {
                            self.sender = address;
                            self.state = SessionState::MailFrom;
                            Step::Reply("250 OK".to_string())
                        }
                        None => {
                            Step::Reply("501 Syntax error in MAIL FROM parameters".to_string())
                        }
                    }
                } else {
                    Step::Reply("503 Bad sequence of commands (expected MAIL FROM)".to_string())
                }
            }
            SessionState::MailFrom | SessionState::RcptTo => {
                if upper.starts_with("RCPT TO:") {
                    match extract_address(line) {
                        Some(address) => {
                            self.recipients.push(address);
                            self.state = SessionState::RcptTo;
                            Step::Reply("250 OK".to_string())
                        }
                        None => Step::Reply("501 Syntax error in RCPT TO parameters".to_string()),
                    }
                } else if upper.starts_with("DATA") {
                    if self.state == SessionState::RcptTo {
                        self.state = SessionState::Data;
                        self.data.clear();
                        Step::Reply("354 Start mail input; end with <CRLF>.<CRLF>".to_string())
                    } else {
                        Step::Reply(
                            "503 Bad sequence of commands (RCPT TO required first)".to_string(),
                        )
                    }
                } else {
                    Step::Reply(
                        "503 Bad sequence of commands (expected RCPT TO or DATA)".to_string(),
                    )
                }
            }
            SessionState::Data => unreachable!("handled above"),
        }
    }

    fn process_data_line(&mut self, line: &str) -> Step {
        if line == "." {
            let envelope = Envelope {
                sender: std::mem::take(&mut self.sender),
                recipients: std::mem::take(&mut self.recipients),
                data: std::mem::take(&mut self.data),
            };
            self.state = SessionState::Greeted;
            return Step::Envelope(envelope);
        }
        // Undo client-side dot-stuffing.
        let content = line.strip_prefix('.').unwrap_or(line);
        self.data.push_str(content);
        self.data.push_str("\r\n");
        Step::Collected
    }

    fn reset_transaction(&mut self) {
        self.sender.clear();
        self.recipients.clear();
        self.data.clear();
        if self.state != SessionState::Connected {
            self.state = SessionState::Greeted;
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Pulls the bare address out of `MAIL FROM:<a@b>` / `RCPT TO:a@b` forms.
fn extract_address(line: &str) -> Option<String> {
    let (_, raw) = line.split_once(':')?;
    let trimmed = raw.trim();
    let spec = trimmed
        .strip_prefix('<')
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(trimmed);
    let spec = spec.trim();
    if spec.is_empty() {
        None
    } else {
        Some(spec.to_string())
    }
}
