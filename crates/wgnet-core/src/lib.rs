//! Control plane for a WireGuard overlay network.
//!
//! This crate owns the domain model, persistence, and every privileged
//! operation of the service:
//!
//! - **[`Controller`]**: Single entry point. Built from an explicit
//!   [`ServiceConfig`] and a [`Store`], it runs each [`Command`] inside one
//!   transaction after the identity gate has passed, and handles manager
//!   sign-in / session upkeep.
//!
//! - **[`Store`]**: Transactional key-value store on `redb`. Readers get a
//!   consistent snapshot; writers commit on success and roll back on error.
//!
//! - **[`AddressPool`]**: Lowest-free IPv4 allocation inside the tunnel
//!   subnet, with one address per peer key.
//!
//! - **[`RouteExpander`]**: Turns "route everything" into the server
//!   subnet plus the public IPv4 space minus private and special ranges.
//!
//! - **[`ZoneStore`]** / **[`TrustSet`]**: The internal DNS zone and the
//!   list of trusted source addresses.

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod model;
pub mod otp;
pub mod pool;
pub mod registry;
pub mod routes;
pub mod session;
pub mod store;
pub mod trust;
pub mod tunnel;
pub mod zone;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::requests::*;
pub use command::{Command, CommandResult};
pub use config::ServiceConfig;
pub use controller::{Controller, RequestContext, Response, SessionGrant};
pub use error::{CoreError, ErrorKind};
pub use identity::{Authorization, IdentityBinder};
pub use otp::{IssuedSecret, OtpVerifier, RandomSecretIssuer, SecretIssuer};
pub use pool::AddressPool;
pub use registry::Registry;
pub use routes::RouteExpander;
pub use session::{SessionResolver, SessionSigner};
pub use store::Store;
pub use trust::TrustSet;
pub use tunnel::{ServerInfo, TunnelProfile};
pub use zone::{Resolution, ZoneStore};

pub use model::{
    ARecord, CnameRecord, Device, DeviceSummary, DnsRecord, Domain, GeneratedKey, PeerKey,
    RecordKind, User, UserId, UserSummary,
};
