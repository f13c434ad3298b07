//! Configuration for the wgnet service and CLI.
//!
//! TOML file + `WGNET_` environment overrides, session secret resolution
//! (env + keyring + plaintext), and translation to
//! `wgnet_core::ServiceConfig`. The core crate never reads files itself.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use ipnet::Ipv4Net;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use wgnet_core::config::{DEFAULT_KEEPALIVE_SECS, DEFAULT_LISTEN_PORT, DEFAULT_OTP_ISSUER};
use wgnet_core::routes::default_exclusions;
use wgnet_core::{PeerKey, ServiceConfig};

const KEYRING_SERVICE: &str = "wgnet";
const KEYRING_SECRET_ENTRY: &str = "session-secret";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no session secret configured while authorization is required")]
    NoSecret,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Server tunnel address with the subnet prefix, e.g. "172.16.0.1/24".
    #[serde(default = "default_tunnel_cidr")]
    pub tunnel_cidr: String,

    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Host name or address peers dial.
    pub endpoint: Option<String>,

    /// Server WireGuard public key (base64).
    pub server_public_key: Option<String>,

    /// Ranges full-tunnel peers keep outside the tunnel. Defaults to the
    /// private and special-use IPv4 blocks.
    pub full_tunnel_exclusions: Option<Vec<String>>,

    /// Seconds between keepalives; 0 turns them off.
    #[serde(default = "default_keepalive")]
    pub persistent_keepalive: Option<u16>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tunnel_cidr: default_tunnel_cidr(),
            listen_port: default_listen_port(),
            endpoint: None,
            server_public_key: None,
            full_tunnel_exclusions: None,
            persistent_keepalive: default_keepalive(),
        }
    }
}

fn default_tunnel_cidr() -> String {
    "172.16.0.1/24".into()
}
fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}
#[allow(clippy::unnecessary_wraps)]
fn default_keepalive() -> Option<u16> {
    Some(DEFAULT_KEEPALIVE_SECS)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Enforce the identity gate on every request.
    #[serde(default = "default_true")]
    pub required: bool,

    /// Session signing key (plaintext; prefer keyring or env var).
    pub session_secret: Option<String>,

    /// Environment variable holding the session signing key.
    pub session_secret_env: Option<String>,

    /// Session lifetime, e.g. "5m" or "1h 30m".
    #[serde(default = "default_session_ttl")]
    pub session_ttl: String,

    #[serde(default = "default_otp_issuer")]
    pub otp_issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            required: true,
            session_secret: None,
            session_secret_env: None,
            session_ttl: default_session_ttl(),
            otp_issuer: default_otp_issuer(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_session_ttl() -> String {
    "5m".into()
}
fn default_otp_issuer() -> String {
    DEFAULT_OTP_ISSUER.into()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Database file. Defaults to the platform data directory.
    pub db_path: Option<PathBuf>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("net", "wgnet", "wgnet")
}

fn home_fallback(parts: &[&str]) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.extend(parts);
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".config", "wgnet", "config.toml"]),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default database location when `storage.db_path` is unset.
pub fn default_db_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".local", "share", "wgnet", "wgnet.redb"]),
        |dirs| dirs.data_dir().join("wgnet.redb"),
    )
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.storage.db_path.clone().unwrap_or_else(default_db_path)
    }
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then the TOML file at `path`, then `WGNET_` variables
/// (`WGNET_AUTH__SESSION_TTL=10m` sets `auth.session_ttl`).
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("WGNET_").split("__"))
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let config: Config = figment(path).extract()?;
    Ok(config)
}

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

// ── Config saving ───────────────────────────────────────────────────

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Secret resolution ───────────────────────────────────────────────

/// Walk the session secret chain: named env var, system keyring, then
/// plaintext in the config. `None` when nothing is configured.
pub fn resolve_session_secret(auth: &AuthConfig) -> Option<SecretString> {
    // 1. Named env var
    if let Some(value) = auth
        .session_secret_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
        .filter(|value| !value.is_empty())
    {
        return Some(SecretString::from(value));
    }

    // 2. System keyring
    if let Some(value) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_SECRET_ENTRY)
        .and_then(|entry| entry.get_password())
        .ok()
        .filter(|value| !value.is_empty())
    {
        return Some(SecretString::from(value));
    }

    // 3. Plaintext in config
    auth.session_secret
        .clone()
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}

/// Store the session secret in the system keyring.
pub fn store_session_secret(secret: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_SECRET_ENTRY)?.set_password(secret)?;
    Ok(())
}

// ── Translation to core ─────────────────────────────────────────────

fn parse_net(field: &str, value: &str) -> Result<Ipv4Net, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(field, format!("expected an IPv4 CIDR, got '{value}'")))
}

/// Validate `cfg` and build the core `ServiceConfig`, resolving the
/// session secret through [`resolve_session_secret`].
pub fn to_service_config(cfg: &Config) -> Result<ServiceConfig, ConfigError> {
    to_service_config_with(cfg, resolve_session_secret(&cfg.auth))
}

/// Like [`to_service_config`] with an already resolved secret.
pub fn to_service_config_with(
    cfg: &Config,
    secret: Option<SecretString>,
) -> Result<ServiceConfig, ConfigError> {
    let network = &cfg.network;
    let auth = &cfg.auth;

    let tunnel_inet = parse_net("network.tunnel_cidr", &network.tunnel_cidr)?;
    if tunnel_inet.prefix_len() > 30 {
        return Err(invalid(
            "network.tunnel_cidr",
            "prefix must leave room for peers (at most /30)",
        ));
    }
    if tunnel_inet.addr() == tunnel_inet.network() || tunnel_inet.addr() == tunnel_inet.broadcast()
    {
        return Err(invalid(
            "network.tunnel_cidr",
            "server address must be a host address inside the subnet",
        ));
    }

    let server_public_key = network
        .server_public_key
        .as_deref()
        .map(str::parse::<PeerKey>)
        .transpose()
        .map_err(|e| invalid("network.server_public_key", e.to_string()))?;

    let route_exclusions = match &network.full_tunnel_exclusions {
        Some(list) => list
            .iter()
            .map(|net| parse_net("network.full_tunnel_exclusions", net))
            .collect::<Result<Vec<_>, _>>()?,
        None => default_exclusions(),
    };

    let session_ttl = humantime::parse_duration(&auth.session_ttl)
        .map_err(|e| invalid("auth.session_ttl", e.to_string()))?;
    if session_ttl.is_zero() {
        return Err(invalid("auth.session_ttl", "must be positive"));
    }

    let session_secret = match secret {
        Some(secret) => secret,
        None if auth.required => return Err(ConfigError::NoSecret),
        None => SecretString::from(String::new()),
    };

    Ok(ServiceConfig {
        tunnel_inet,
        listen_port: network.listen_port,
        endpoint_host: network.endpoint.clone().filter(|host| !host.trim().is_empty()),
        server_public_key,
        auth_required: auth.required,
        session_secret,
        session_ttl,
        otp_issuer: auth.otp_issuer.clone(),
        route_exclusions,
        persistent_keepalive: network.persistent_keepalive.filter(|secs| *secs > 0),
    })
}
