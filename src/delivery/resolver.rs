//! MX resolution for the direct-send path.

use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::Resolver;

use super::error::DeliveryError;

/// One MX record: preference plus exchange host, normalized to lowercase
/// with the trailing root dot stripped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct MxRecord {
    pub preference: u16,
    pub exchange: String,
}

impl MxRecord {
    pub(crate) fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

/// Pick the lowest-preference exchange for `domain`, normalized via IDNA
/// before querying DNS. An empty or absent
/// answer is [`DeliveryError::NoMailServer`]; the address will still be
/// reported per-recipient, never aborting a batch.
pub(crate) fn best_exchange<R>(resolver: &R, domain: &str) -> Result<String, DeliveryError>
where
    R: LookupMx,
{
    let ascii = normalize_domain(domain)?;
    let mut records = match resolver.lookup_mx(&ascii) {
        Ok(records) => records,
        Err(err) => match err.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => Vec::new(),
            _ => {
                return Err(DeliveryError::Resolve {
                    domain: ascii,
                    source: err,
                });
            }
        },
    };

    records.sort();
    records.dedup();

    records
        .into_iter()
        .next()
        .map(|record| record.exchange)
        .ok_or(DeliveryError::NoMailServer { domain: ascii })
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, DeliveryError> {
    let trimmed = domain.trim();
    idna::domain_to_ascii(trimmed).map_err(|source| DeliveryError::IdnaConversion {
        domain: trimmed.to_string(),
        source,
    })
}

pub(crate) fn normalize_exchange(exchange: String) -> String {
    exchange.trim_end_matches('.').to_ascii_lowercase()
}

pub(crate) trait LookupMx {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError>;
}

impl LookupMx for Resolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        let lookup = Resolver::mx_lookup(self, domain)?;
        let mut records = Vec::new();
        for mx in lookup.iter() {
            let exchange = normalize_exchange(mx.exchange().to_utf8());
            records.push(MxRecord::new(mx.preference(), exchange));
        }
        Ok(records)
    }
}

#[cfg(test)]
impl LookupMx for crate::delivery::tests::StubResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        (self.on_lookup)(domain)
    }
}
