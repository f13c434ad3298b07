//! Peer tunnel profiles.
//!
//! Renders the wg-quick style configuration a device imports. Allowed
//! destinations pass through [`RouteExpander`] so a full-tunnel device
//! gets an explicit prefix list instead of a bare default route.

use ipnet::Ipv4Net;
use serde::Serialize;
use std::fmt::Write as _;
use std::net::Ipv4Addr;

use crate::config::ServiceConfig;
use crate::model::{Device, PeerKey};
use crate::routes::RouteExpander;

const PLACEHOLDER: &str = "<PLACEHOLDER>";

/// What a client needs to know about the server end of the tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub tunnel_inet: Ipv4Net,
    pub listen_port: u16,
    pub endpoint: Option<String>,
    pub public_key: Option<PeerKey>,
}

impl From<&ServiceConfig> for ServerInfo {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            tunnel_inet: config.tunnel_inet,
            listen_port: config.listen_port,
            endpoint: config.endpoint(),
            public_key: config.server_public_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunnelProfile {
    pub address: Ipv4Net,
    pub dns: Ipv4Addr,
    pub server_public_key: Option<PeerKey>,
    pub endpoint: Option<String>,
    pub allowed_ips: Vec<Ipv4Net>,
    pub persistent_keepalive: Option<u16>,
}

impl TunnelProfile {
    pub fn new(config: &ServiceConfig, routes: &RouteExpander, device: &Device) -> Self {
        let subnet = config.tunnel_subnet();
        Self {
            address: device.inet,
            dns: config.server_address(),
            server_public_key: config.server_public_key,
            endpoint: config.endpoint(),
            allowed_ips: routes.expand(subnet, &device.allowed_ips(subnet)),
            persistent_keepalive: config.persistent_keepalive,
        }
    }

    /// wg-quick text. Unknown values are left as a placeholder for the
    /// operator to fill in.
    pub fn render(&self, private_key: Option<&str>) -> String {
        let allowed = self
            .allowed_ips
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let server_key = self
            .server_public_key
            .map_or_else(|| PLACEHOLDER.to_owned(), |key| key.to_string());

        let mut out = String::new();
        let _ = writeln!(out, "[Interface]");
        let _ = writeln!(out, "PrivateKey = {}", private_key.unwrap_or(PLACEHOLDER));
        let _ = writeln!(out, "Address = {}", self.address);
        let _ = writeln!(out, "DNS = {}", self.dns);
        let _ = writeln!(out);
        let _ = writeln!(out, "[Peer]");
        let _ = writeln!(out, "PublicKey = {server_key}");
        let _ = writeln!(out, "AllowedIPs = {allowed}");
        let _ = writeln!(
            out,
            "Endpoint = {}",
            self.endpoint.as_deref().unwrap_or(PLACEHOLDER)
        );
        if let Some(keepalive) = self.persistent_keepalive {
            let _ = writeln!(out, "PersistentKeepalive = {keepalive}");
        }
        out
    }
}
