// ── DNS zone records ──
//
// A domain holds either A records or a single CNAME, never both.
// `Domain::apply` is the only way records get added, so the exclusivity
// rule lives in one place.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::error::CoreError;

pub const MAX_NAME_LEN: usize = 253;
pub const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ARecord {
    pub address: Ipv4Addr,
    pub ttl: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CnameRecord {
    pub target: String,
    pub ttl: u32,
}

/// A record to be written into a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum DnsRecord {
    A(ARecord),
    Cname(CnameRecord),
}

impl DnsRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::A(_) => RecordKind::A,
            Self::Cname(_) => RecordKind::Cname,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum RecordKind {
    #[strum(serialize = "A")]
    #[serde(rename = "A")]
    A,
    #[strum(serialize = "CNAME")]
    #[serde(rename = "CNAME")]
    Cname,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    /// Sorted by address, at most one record per address.
    #[serde(default)]
    pub a: Vec<ARecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<CnameRecord>,
}

impl Domain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            a: Vec::new(),
            cname: None,
        }
    }

    /// Which record type the domain currently holds, if any.
    pub fn record_kind(&self) -> Option<RecordKind> {
        if self.cname.is_some() {
            Some(RecordKind::Cname)
        } else if self.a.is_empty() {
            None
        } else {
            Some(RecordKind::A)
        }
    }

    /// Adds or replaces a record, refusing to mix A and CNAME.
    ///
    /// An A record for an address already present replaces that record's
    /// TTL. A CNAME replaces any previous CNAME.
    pub fn apply(&mut self, record: DnsRecord) -> Result<(), CoreError> {
        let requested = record.kind();
        if let Some(existing) = self.record_kind().filter(|kind| *kind != requested) {
            return Err(CoreError::ConflictingRecordType {
                name: self.name.clone(),
                existing,
                requested,
            });
        }

        match record {
            DnsRecord::A(rec) => match self.a.binary_search_by_key(&rec.address, |r| r.address) {
                Ok(idx) => self.a[idx] = rec,
                Err(idx) => self.a.insert(idx, rec),
            },
            DnsRecord::Cname(rec) => self.cname = Some(rec),
        }
        Ok(())
    }

    /// Removes the A record for `address`. Returns whether one was removed.
    pub fn remove_a(&mut self, address: Ipv4Addr) -> bool {
        match self.a.binary_search_by_key(&address, |r| r.address) {
            Ok(idx) => {
                self.a.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Clears the CNAME only when it points at `target`.
    pub fn remove_cname(&mut self, target: &str) -> bool {
        let matches = self
            .cname
            .as_ref()
            .is_some_and(|rec| rec.target.eq_ignore_ascii_case(target.trim_end_matches('.')));
        if matches {
            self.cname = None;
        }
        matches
    }
}

/// Normalizes and validates a domain name: lowercase, no trailing dot,
/// at most 253 bytes, labels of 1 to 63 letters, digits, `-` or `_`.
pub fn validate_domain_name(field: &str, name: &str) -> Result<String, CoreError> {
    let name = name.trim().trim_end_matches('.').to_ascii_lowercase();

    if name.is_empty() {
        return Err(CoreError::validation(field, "must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::validation(
            field,
            format!("must be at most {MAX_NAME_LEN} bytes"),
        ));
    }
    for label in name.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(CoreError::validation(
                field,
                format!("labels must be 1 to {MAX_LABEL_LEN} bytes"),
            ));
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(CoreError::validation(
                field,
                format!("label {label:?} contains invalid characters"),
            ));
        }
    }
    Ok(name)
}
