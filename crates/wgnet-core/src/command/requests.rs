// ── Typed request structs for Command payloads ──

use serde::{Deserialize, Serialize};

use crate::model::{PeerKey, UserId};

// ── Users ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub is_manager: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_manager: Option<bool>,
}

// ── Devices ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeviceRequest {
    pub owner: UserId,
    pub label: String,
    #[serde(default)]
    pub wan_forward: bool,
    /// Generated server-side when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PeerKey>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDeviceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wan_forward: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PeerKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,
}

impl UpdateDeviceRequest {
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.wan_forward.is_none()
            && self.public_key.is_none()
            && self.owner.is_none()
    }
}
