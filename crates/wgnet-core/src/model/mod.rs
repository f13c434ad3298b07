// ── Domain model ──
//
// Canonical types persisted by the store and returned to callers.

pub mod device;
pub mod dns;
pub mod id;
pub mod key;
pub mod user;

pub use device::{Device, DeviceSummary};
pub use dns::{ARecord, CnameRecord, DnsRecord, Domain, RecordKind, validate_domain_name};
pub use id::UserId;
pub use key::{GeneratedKey, PeerKey};
pub use user::{StoredSession, User, UserSummary};

use crate::error::CoreError;

/// Human-readable names and labels: non-empty, at most 255 bytes.
pub(crate) fn validate_label(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(field, "must not be empty"));
    }
    if value.len() > 255 {
        return Err(CoreError::validation(field, "must be at most 255 bytes"));
    }
    Ok(())
}
