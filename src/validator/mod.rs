//! Syntactic validation of addresses, address lists, and port strings.
//!
//! These checks run before any I/O: an address that passes here may still be
//! undeliverable, and no DNS lookup is ever performed on this path.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// `local-part@domain.tld` where the final label is at least two letters.
static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
        .expect("address pattern compiles")
});

/// Returns `true` when `address` (ignoring surrounding whitespace) matches the
/// address grammar.
pub fn validate_address(address: &str) -> bool {
    ADDRESS_PATTERN.is_match(address.trim())
}

/// Result of validating a comma-separated address list.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressList {
    /// Every entry validated; holds the trimmed addresses in input order.
    Valid(Vec<String>),
    /// At least one entry failed; holds the offending entries in input order.
    Invalid(Vec<String>),
}

impl AddressList {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// The validated addresses, empty for the invalid case.
    pub fn addresses(&self) -> &[String] {
        match self {
            Self::Valid(addresses) => addresses.as_slice(),
            Self::Invalid(_) => &[],
        }
    }
}

/// Splits `list` on commas, trims each entry, and validates all of them.
///
/// The empty string is valid and yields an empty list (Cc fields are
/// optional).
pub fn validate_address_list(list: &str) -> AddressList {
    if list.trim().is_empty() {
        return AddressList::Valid(Vec::new());
    }

    let entries: Vec<String> = list.split(',').map(|entry| entry.trim().to_string()).collect();
    let invalid: Vec<String> = entries
        .iter()
        .filter(|entry| !validate_address(entry))
        .cloned()
        .collect();

    if invalid.is_empty() {
        AddressList::Valid(entries)
    } else {
        AddressList::Invalid(invalid)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("port must be a number, got '{0}'")]
    NotANumber(String),
    #[error("port {0} out of range (1..=65535)")]
    OutOfRange(i64),
}

/// Parses a port string, accepting integers in `1..=65535`.
pub fn validate_port(input: &str) -> Result<u16, PortError> {
    let trimmed = input.trim();
    let value: i64 = trimmed
        .parse()
        .map_err(|_| PortError::NotANumber(trimmed.to_string()))?;
    if (1..=65535).contains(&value) {
        Ok(value as u16)
    } else {
        Err(PortError::OutOfRange(value))
    }
}
