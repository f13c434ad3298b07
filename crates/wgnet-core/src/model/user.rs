// ── Users ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use super::id::UserId;

/// A person who owns devices. Managers additionally hold a second-factor
/// secret and may sign in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub is_manager: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tfa_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<StoredSession>,
    #[serde(default)]
    pub devices: BTreeSet<Ipv4Addr>,
}

/// Server-side half of a signed session. A token only resolves while its
/// nonce matches the one stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub nonce: String,
    pub expires: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UserId::generate(),
            name: name.into(),
            is_manager: false,
            tfa_secret: None,
            session: None,
            devices: BTreeSet::new(),
        }
    }

    /// Drops manager rights along with everything that depends on them.
    pub fn revoke_manager(&mut self) {
        self.is_manager = false;
        self.tfa_secret = None;
        self.session = None;
    }
}

/// Outward view of a user. Never carries secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub is_manager: bool,
    pub devices: Vec<Ipv4Addr>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            is_manager: user.is_manager,
            devices: user.devices.iter().copied().collect(),
        }
    }
}
