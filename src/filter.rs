//! Record selection and per-run deduplication.

use std::collections::HashSet;

use crate::variomedia::{Customer, DnsRecord};

/// Record types that make it into the export. Matched exactly.
pub const ADDRESS_RECORD_TYPES: [&str; 2] = ["A", "AAAA"];

const KEY_DELIMITER: &str = ";";
const TAG_SEPARATOR: &str = ", ";

/// One CSV line, in header column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub customer_id: String,
    pub customer_name: String,
    pub record_type: String,
    pub fqdn: String,
    pub name: String,
    pub domain: String,
    pub data: String,
    pub ttl: String,
    pub tags: String,
}

impl OutputRow {
    pub fn new(customer: &Customer, record: &DnsRecord) -> Self {
        Self {
            customer_id: customer.id.clone(),
            customer_name: customer.name.clone(),
            record_type: record.record_type.clone(),
            fqdn: record.fqdn.clone(),
            name: record.name.clone(),
            domain: record.domain.clone(),
            data: record.data.clone(),
            ttl: record.ttl.clone(),
            tags: record.tags.join(TAG_SEPARATOR),
        }
    }

    pub fn fields(&self) -> [&str; 9] {
        [
            self.customer_id.as_str(),
            self.customer_name.as_str(),
            self.record_type.as_str(),
            self.fqdn.as_str(),
            self.name.as_str(),
            self.domain.as_str(),
            self.data.as_str(),
            self.ttl.as_str(),
            self.tags.as_str(),
        ]
    }

    /// Every column except the customer name.
    pub fn dedup_key(&self) -> String {
        [
            self.customer_id.as_str(),
            &self.record_type,
            &self.fqdn,
            &self.name,
            &self.domain,
            &self.data,
            &self.ttl,
            &self.tags,
        ]
        .join(KEY_DELIMITER)
    }
}

/// Outcome of offering one record to the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(OutputRow),
    NotAddressRecord,
    Duplicate,
}

/// Address-record filter with a dedup set scoped to one export run.
///
/// The set holds one key per written row and is never pruned, so memory grows
/// with the number of unique records in the run.
#[derive(Debug, Default)]
pub struct RowFilter {
    seen: HashSet<String>,
}

impl RowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_address_record(record_type: &str) -> bool {
        ADDRESS_RECORD_TYPES.contains(&record_type)
    }

    /// Decide whether `record` is written for `customer`.
    ///
    /// Empty data, empty domain and placeholder addresses pass through; only
    /// the record type and uniqueness gate a row.
    pub fn accept(&mut self, record: &DnsRecord, customer: &Customer) -> Verdict {
        if !Self::is_address_record(&record.record_type) {
            return Verdict::NotAddressRecord;
        }

        let row = OutputRow::new(customer, record);
        if self.seen.insert(row.dedup_key()) {
            Verdict::Accepted(row)
        } else {
            Verdict::Duplicate
        }
    }
}
