use std::fmt;

/// Classification of one direct-send attempt.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// The remote server accepted the full transaction.
    Sent,
    /// The remote server refused the sender or the recipient at the protocol
    /// level, typically because it requires authentication.
    Refused,
    /// No connection could be established on either port.
    ConnectionFailed,
    /// Anything else: DNS failure, timeout mid-session, protocol violation.
    Other,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => f.write_str("sent"),
            Self::Refused => f.write_str("refused"),
            Self::ConnectionFailed => f.write_str("connection failed"),
            Self::Other => f.write_str("error"),
        }
    }
}

/// Per-recipient result of a direct send.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub recipient: String,
    pub kind: OutcomeKind,
    pub detail: String,
}

/// Aggregate result of a direct-send batch. Failures keep the input
/// recipient order; partial success is the expected case, not an error.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectSendReport {
    pub sent: usize,
    pub failures: Vec<DeliveryOutcome>,
}

impl DirectSendReport {
    pub(crate) fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome.kind {
            OutcomeKind::Sent => self.sent += 1,
            _ => self.failures.push(outcome),
        }
    }

    pub fn all_sent(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of a successful relay transaction (local or authenticated).
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReceipt {
    /// Number of recipients the relay accepted.
    pub accepted: usize,
    /// Final server reply to the message submission.
    pub reply: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_sent_and_keeps_failures_ordered() {
        let mut report = DirectSendReport::default();
        report.record(DeliveryOutcome {
            recipient: "a@example.com".to_string(),
            kind: OutcomeKind::Sent,
            detail: "delivered".to_string(),
        });
        report.record(DeliveryOutcome {
            recipient: "b@example.com".to_string(),
            kind: OutcomeKind::Refused,
            detail: "550".to_string(),
        });
        report.record(DeliveryOutcome {
            recipient: "c@example.com".to_string(),
            kind: OutcomeKind::ConnectionFailed,
            detail: "both ports".to_string(),
        });

        assert_eq!(report.sent, 1);
        assert!(!report.all_sent());
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].recipient, "b@example.com");
        assert_eq!(report.failures[1].recipient, "c@example.com");
    }
}
