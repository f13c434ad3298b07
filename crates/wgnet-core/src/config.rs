// ── Runtime service configuration ──
//
// Everything the components need, passed in explicitly. The config
// crate (or a test) builds a `ServiceConfig` and hands it to
// `Controller::new`; core never reads config files or the environment.

use ipnet::Ipv4Net;
use secrecy::SecretString;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::model::PeerKey;
use crate::routes::default_exclusions;

pub const DEFAULT_LISTEN_PORT: u16 = 51820;
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_OTP_ISSUER: &str = "wgnet";
pub const DEFAULT_KEEPALIVE_SECS: u16 = 25;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// The service's own tunnel address with the tunnel subnet's prefix.
    /// Device addresses come from this subnet.
    pub tunnel_inet: Ipv4Net,
    pub listen_port: u16,
    /// Public host peers dial, without the port.
    pub endpoint_host: Option<String>,
    pub server_public_key: Option<PeerKey>,
    /// Enforce the identity gate. Off only for trusted administrative use.
    pub auth_required: bool,
    /// Key for signing session tokens. Empty disables sign-in.
    pub session_secret: SecretString,
    pub session_ttl: Duration,
    pub otp_issuer: String,
    /// Ranges full-tunnel peers keep routing outside the tunnel.
    pub route_exclusions: Vec<Ipv4Net>,
    pub persistent_keepalive: Option<u16>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tunnel_inet: Ipv4Net::new(Ipv4Addr::new(172, 16, 0, 1), 24)
                .unwrap_or_default(),
            listen_port: DEFAULT_LISTEN_PORT,
            endpoint_host: None,
            server_public_key: None,
            auth_required: true,
            session_secret: SecretString::from(String::new()),
            session_ttl: DEFAULT_SESSION_TTL,
            otp_issuer: DEFAULT_OTP_ISSUER.into(),
            route_exclusions: default_exclusions(),
            persistent_keepalive: Some(DEFAULT_KEEPALIVE_SECS),
        }
    }
}

impl ServiceConfig {
    pub fn server_address(&self) -> Ipv4Addr {
        self.tunnel_inet.addr()
    }

    pub fn tunnel_subnet(&self) -> Ipv4Net {
        self.tunnel_inet.trunc()
    }

    /// `host:port` peers connect to, when a host is configured.
    pub fn endpoint(&self) -> Option<String> {
        self.endpoint_host
            .as_ref()
            .map(|host| format!("{host}:{}", self.listen_port))
    }
}
