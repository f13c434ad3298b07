// ── Command API ──
//
// Every privileged operation is one `Command` variant. The controller
// authorizes the request once, then routes the variant to the component
// that owns it inside a single transaction.

pub mod requests;

use secrecy::SecretString;
use std::net::Ipv4Addr;

use crate::model::{DeviceSummary, DnsRecord, Domain, UserId, UserSummary};
use crate::otp::IssuedSecret;
use crate::tunnel::{ServerInfo, TunnelProfile};
use crate::zone::Resolution;

pub use requests::{
    CreateDeviceRequest, CreateUserRequest, UpdateDeviceRequest, UpdateUserRequest,
};

#[derive(Debug, Clone)]
pub enum Command {
    // ── Users ────────────────────────────────────────────────────────
    ListUsers,
    GetUser {
        id: UserId,
    },
    CreateUser(CreateUserRequest),
    UpdateUser {
        id: UserId,
        update: UpdateUserRequest,
    },
    RemoveUser {
        id: UserId,
    },

    // ── Devices ──────────────────────────────────────────────────────
    ListDevices,
    GetDevice {
        address: Ipv4Addr,
    },
    CreateDevice(CreateDeviceRequest),
    UpdateDevice {
        address: Ipv4Addr,
        update: UpdateDeviceRequest,
    },
    RemoveDevice {
        address: Ipv4Addr,
    },
    DeviceProfile {
        address: Ipv4Addr,
    },

    // ── DNS zone ─────────────────────────────────────────────────────
    ListDomains,
    GetDomain {
        name: String,
    },
    CreateDomain {
        name: String,
    },
    RemoveDomain {
        name: String,
    },
    SetRecord {
        name: String,
        record: DnsRecord,
    },
    RemoveARecord {
        name: String,
        address: Ipv4Addr,
    },
    RemoveCnameRecord {
        name: String,
        target: String,
    },
    ResolveDomain {
        name: String,
    },

    // ── Trusted sources ──────────────────────────────────────────────
    ListTrusted,
    AddTrusted {
        address: Ipv4Addr,
    },
    RemoveTrusted {
        address: Ipv4Addr,
    },
    ReplaceTrusted {
        addresses: Vec<Ipv4Addr>,
    },

    // ── Server ───────────────────────────────────────────────────────
    ServerInfo,
}

impl Command {
    /// Whether the command needs a writable transaction.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateUser(_)
                | Self::UpdateUser { .. }
                | Self::RemoveUser { .. }
                | Self::CreateDevice(_)
                | Self::UpdateDevice { .. }
                | Self::RemoveDevice { .. }
                | Self::CreateDomain { .. }
                | Self::RemoveDomain { .. }
                | Self::SetRecord { .. }
                | Self::RemoveARecord { .. }
                | Self::RemoveCnameRecord { .. }
                | Self::AddTrusted { .. }
                | Self::RemoveTrusted { .. }
                | Self::ReplaceTrusted { .. }
        )
    }
}

/// Typed payload for each command.
#[derive(Debug)]
pub enum CommandResult {
    Ok,
    User(UserSummary),
    Users(Vec<UserSummary>),
    /// `otp` is present only when this change issued a second-factor secret.
    UserChanged {
        user: UserSummary,
        otp: Option<IssuedSecret>,
    },
    Device(DeviceSummary),
    Devices(Vec<DeviceSummary>),
    /// `private_key` is present only when the key was generated here.
    DeviceCreated {
        device: DeviceSummary,
        profile: TunnelProfile,
        private_key: Option<SecretString>,
    },
    Profile(TunnelProfile),
    Domain(Domain),
    Domains(Vec<Domain>),
    /// `removed` is false when no matching record existed.
    RecordRemoved {
        domain: Domain,
        removed: bool,
    },
    Resolution(Resolution),
    Trusted(Vec<Ipv4Addr>),
    /// `changed` is false when the set already matched the request.
    TrustChanged {
        address: Ipv4Addr,
        changed: bool,
    },
    Server(ServerInfo),
}
