//! In-memory store of received messages.
//!
//! The store is owned by a single consumer: the inbound listener never
//! touches it directly and instead ships [`ReceivedRecord`]s over its event
//! channel for the owner to append.

/// One successfully parsed inbound envelope. Never mutated after creation.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedRecord {
    /// Wall-clock receive time, `%Y-%m-%d %H:%M:%S`.
    pub received_at: String,
    pub sender: String,
    /// Envelope recipients, comma-joined.
    pub recipients: String,
    pub subject: String,
    pub body: String,
    /// Peer socket address of the delivering client.
    pub peer: String,
}

/// Append-only, insertion-ordered record store with an explicit API.
#[derive(Debug, Default)]
pub struct MailStore {
    records: Vec<ReceivedRecord>,
}

impl MailStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: ReceivedRecord) {
        self.records.push(record);
    }

    /// Empties the store. The only way records are ever removed.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// A point-in-time copy of all records, oldest first.
    pub fn snapshot(&self) -> Vec<ReceivedRecord> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
