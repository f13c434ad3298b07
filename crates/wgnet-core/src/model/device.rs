// ── Devices ──

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use super::id::UserId;
use super::key::PeerKey;

/// A tunnel peer holding one allocated address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Allocated address with the tunnel subnet's prefix length.
    pub inet: Ipv4Net,
    pub public_key: PeerKey,
    pub label: String,
    /// Route all of the peer's traffic through the tunnel.
    #[serde(default)]
    pub wan_forward: bool,
    pub owner: UserId,
}

impl Device {
    pub fn address(&self) -> Ipv4Addr {
        self.inet.addr()
    }

    /// Destinations the peer may send through the tunnel.
    pub fn allowed_ips(&self, server_subnet: Ipv4Net) -> Vec<Ipv4Net> {
        if self.wan_forward {
            vec![Ipv4Net::default()]
        } else {
            vec![server_subnet.trunc()]
        }
    }
}

/// Device plus the routes a peer config would carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub address: Ipv4Addr,
    pub inet: Ipv4Net,
    pub public_key: PeerKey,
    pub label: String,
    pub wan_forward: bool,
    pub owner: UserId,
    pub allowed_ips: Vec<Ipv4Net>,
}

impl DeviceSummary {
    pub fn new(device: &Device, server_subnet: Ipv4Net) -> Self {
        Self {
            address: device.address(),
            inet: device.inet,
            public_key: device.public_key,
            label: device.label.clone(),
            wan_forward: device.wan_forward,
            owner: device.owner,
            allowed_ips: device.allowed_ips(server_subnet),
        }
    }
}
