// ── Controller ──
//
// Single entry point for transports and the CLI. Built once from an
// explicit `ServiceConfig` and a `Store`; every request runs in exactly
// one transaction, and the identity gate runs once at the top of it.

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::command::{Command, CommandResult};
use crate::config::ServiceConfig;
use crate::error::CoreError;
use crate::identity::IdentityBinder;
use crate::model::{Device, DeviceSummary, User, UserSummary};
use crate::otp::{OtpVerifier, RandomSecretIssuer, SecretIssuer};
use crate::pool::AddressPool;
use crate::registry::Registry;
use crate::routes::RouteExpander;
use crate::session::{SessionResolver, SessionSigner};
use crate::store::{Snapshot, Store, WriteTx};
use crate::trust::TrustSet;
use crate::tunnel::{ServerInfo, TunnelProfile};
use crate::zone::ZoneStore;

type Result<T> = std::result::Result<T, CoreError>;

// ── Request / response envelopes ─────────────────────────────────

/// Who is asking: the network source address and the presented token.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub source: String,
    pub session: Option<String>,
}

impl RequestContext {
    pub fn new(source: impl Into<String>, session: Option<String>) -> Self {
        Self {
            source: source.into(),
            session,
        }
    }

    /// Local operator access. Only passes a controller built with
    /// `auth_required = false`.
    pub fn administrative() -> Self {
        Self::new("local", None)
    }

    fn token(&self) -> &str {
        self.session.as_deref().unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct Response {
    pub result: CommandResult,
    /// Session token echoed back to an authorized caller.
    pub session: Option<String>,
}

/// A freshly minted or prolonged session.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub token: String,
    pub expires: DateTime<Utc>,
}

/// Resolver used when sign-in is disabled: nothing resolves.
struct NoSessions;

impl SessionResolver for NoSessions {
    fn resolve(&self, _tx: &dyn Snapshot, _token: &str) -> Result<User> {
        Err(CoreError::unauthorized("sessions are disabled"))
    }
}

// ── Controller ───────────────────────────────────────────────────

/// Cheaply cloneable via `Arc<ControllerInner>`.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ServiceConfig,
    store: Store,
    registry: Registry,
    binder: IdentityBinder,
    sessions: Option<Arc<SessionSigner>>,
    routes: RouteExpander,
    zone: ZoneStore,
    trust: TrustSet,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("tunnel_inet", &self.inner.config.tunnel_inet)
            .field("auth_required", &self.inner.config.auth_required)
            .finish_non_exhaustive()
    }
}

impl Controller {
    pub fn new(config: ServiceConfig, store: Store) -> Result<Self> {
        let issuer = Arc::new(RandomSecretIssuer::new(config.otp_issuer.clone()));
        Self::with_issuer(config, store, issuer)
    }

    /// Like [`new`](Self::new) with a custom second-factor issuer.
    pub fn with_issuer(
        config: ServiceConfig,
        store: Store,
        issuer: Arc<dyn SecretIssuer>,
    ) -> Result<Self> {
        let pool = AddressPool::for_server(config.tunnel_inet)?;

        let sessions = if config.session_secret.expose_secret().is_empty() {
            if config.auth_required {
                return Err(CoreError::validation(
                    "session_secret",
                    "required when authorization is enabled",
                ));
            }
            None
        } else {
            let ttl = chrono::Duration::from_std(config.session_ttl)
                .map_err(|e| CoreError::validation("session_ttl", e.to_string()))?;
            Some(Arc::new(SessionSigner::new(config.session_secret.clone(), ttl)?))
        };

        let resolver: Arc<dyn SessionResolver> = match &sessions {
            Some(signer) => signer.clone(),
            None => Arc::new(NoSessions),
        };
        let binder = IdentityBinder::new(resolver, config.auth_required);
        let routes = RouteExpander::new(&config.route_exclusions);

        info!(
            tunnel = %config.tunnel_inet,
            auth_required = config.auth_required,
            capacity = pool.capacity(),
            "controller ready"
        );

        Ok(Self {
            inner: Arc::new(ControllerInner {
                registry: Registry::new(pool, issuer),
                binder,
                sessions,
                routes,
                zone: ZoneStore,
                trust: TrustSet,
                store,
                config,
            }),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn routes(&self) -> &RouteExpander {
        &self.inner.routes
    }

    pub fn pool(&self) -> &AddressPool {
        self.inner.registry.pool()
    }

    // ── Command routing ──────────────────────────────────────────

    /// Authorizes `ctx` and runs `command` in one transaction.
    pub fn execute(&self, ctx: &RequestContext, command: Command) -> Result<Response> {
        let inner = &self.inner;
        debug!(source = %ctx.source, ?command, "executing command");

        if command.is_mutation() {
            inner.store.write(|tx| {
                let auth = inner.binder.authorize(tx, &ctx.source, ctx.token())?;
                let result = self.mutate(tx, command)?;
                Ok(Response {
                    result,
                    session: auth.session_echo().map(str::to_owned),
                })
            })
        } else {
            inner.store.read(|tx| {
                let auth = inner.binder.authorize(tx, &ctx.source, ctx.token())?;
                let result = self.query(tx, command)?;
                Ok(Response {
                    result,
                    session: auth.session_echo().map(str::to_owned),
                })
            })
        }
    }

    fn device_summary(&self, device: &Device) -> DeviceSummary {
        DeviceSummary::new(device, self.inner.config.tunnel_subnet())
    }

    fn profile(&self, device: &Device) -> TunnelProfile {
        TunnelProfile::new(&self.inner.config, &self.inner.routes, device)
    }

    fn query(&self, tx: &dyn Snapshot, command: Command) -> Result<CommandResult> {
        let inner = &self.inner;
        Ok(match command {
            Command::ListUsers => CommandResult::Users(
                Registry::users(tx)?
                    .iter()
                    .map(UserSummary::from)
                    .collect(),
            ),
            Command::GetUser { id } => {
                CommandResult::User(UserSummary::from(&Registry::user_record(tx, id)?))
            }
            Command::ListDevices => CommandResult::Devices(
                Registry::devices(tx)?
                    .iter()
                    .map(|d| self.device_summary(d))
                    .collect(),
            ),
            Command::GetDevice { address } => {
                CommandResult::Device(self.device_summary(&Registry::device_record(tx, address)?))
            }
            Command::DeviceProfile { address } => {
                CommandResult::Profile(self.profile(&Registry::device_record(tx, address)?))
            }
            Command::ListDomains => CommandResult::Domains(inner.zone.list(tx)?),
            Command::GetDomain { name } => CommandResult::Domain(inner.zone.get(tx, &name)?),
            Command::ResolveDomain { name } => {
                CommandResult::Resolution(inner.zone.resolve(tx, &name)?)
            }
            Command::ListTrusted => {
                CommandResult::Trusted(inner.trust.list(tx)?.into_iter().collect())
            }
            Command::ServerInfo => CommandResult::Server(ServerInfo::from(&inner.config)),
            other => {
                return Err(CoreError::validation(
                    "command",
                    format!("{other:?} needs a writable transaction"),
                ));
            }
        })
    }

    fn mutate(&self, tx: &WriteTx, command: Command) -> Result<CommandResult> {
        let inner = &self.inner;
        let registry = &inner.registry;
        Ok(match command {
            Command::CreateUser(request) => {
                let change = registry.create_user(tx, &request)?;
                CommandResult::UserChanged {
                    user: UserSummary::from(&change.user),
                    otp: change.issued,
                }
            }
            Command::UpdateUser { id, update } => {
                let change = registry.update_user(tx, id, &update)?;
                CommandResult::UserChanged {
                    user: UserSummary::from(&change.user),
                    otp: change.issued,
                }
            }
            Command::RemoveUser { id } => {
                CommandResult::User(UserSummary::from(&registry.remove_user(tx, id)?))
            }
            Command::CreateDevice(request) => {
                let provision = registry.create_device(tx, &request)?;
                CommandResult::DeviceCreated {
                    device: self.device_summary(&provision.device),
                    profile: self.profile(&provision.device),
                    private_key: provision.private_key,
                }
            }
            Command::UpdateDevice { address, update } => {
                let device = registry.update_device(tx, address, &update)?;
                CommandResult::Device(self.device_summary(&device))
            }
            Command::RemoveDevice { address } => {
                let device = registry.remove_device(tx, address)?;
                CommandResult::Device(self.device_summary(&device))
            }
            Command::CreateDomain { name } => CommandResult::Domain(inner.zone.create(tx, &name)?),
            Command::RemoveDomain { name } => {
                inner.zone.remove(tx, &name)?;
                CommandResult::Ok
            }
            Command::SetRecord { name, record } => {
                CommandResult::Domain(inner.zone.set(tx, &name, record)?)
            }
            Command::RemoveARecord { name, address } => {
                let (domain, removed) = inner.zone.remove_a(tx, &name, address)?;
                CommandResult::RecordRemoved { domain, removed }
            }
            Command::RemoveCnameRecord { name, target } => {
                let (domain, removed) = inner.zone.remove_cname(tx, &name, &target)?;
                CommandResult::RecordRemoved { domain, removed }
            }
            Command::AddTrusted { address } => CommandResult::TrustChanged {
                address,
                changed: inner.trust.add(tx, address)?,
            },
            Command::RemoveTrusted { address } => CommandResult::TrustChanged {
                address,
                changed: inner.trust.remove(tx, address)?,
            },
            Command::ReplaceTrusted { addresses } => {
                CommandResult::Trusted(inner.trust.replace(tx, addresses)?.into_iter().collect())
            }
            other => self.query(tx, other)?,
        })
    }

    // ── Sessions ─────────────────────────────────────────────────

    fn signer(&self) -> Result<&SessionSigner> {
        self.inner
            .sessions
            .as_deref()
            .ok_or_else(|| CoreError::unauthorized("sessions are disabled"))
    }

    /// Starts a session for the manager owning the device at `source`
    /// once `verifier` accepts `code`.
    pub fn sign_in(
        &self,
        source: &str,
        code: &str,
        verifier: &dyn OtpVerifier,
    ) -> Result<SessionGrant> {
        let signer = self.signer()?;
        self.inner.store.write(|tx| {
            let address: Ipv4Addr = source
                .trim()
                .parse()
                .map_err(|_| CoreError::unauthorized("source is not an IPv4 address"))?;
            let device = Registry::device_record(tx, address).map_err(|err| match err {
                CoreError::NotFound { .. } => CoreError::unauthorized("no device at source"),
                other => other,
            })?;
            let mut user = Registry::user_record(tx, device.owner)?;

            let secret = user
                .tfa_secret
                .as_deref()
                .filter(|_| user.is_manager)
                .ok_or_else(|| CoreError::unauthorized("device owner is not a manager"))?;
            if !verifier.verify(secret, code) {
                return Err(CoreError::unauthorized("one-time code rejected"));
            }

            let now = Utc::now();
            let token = signer.issue(&mut user, now)?;
            Registry::save_user(tx, &user)?;
            info!(user = %user.id, %source, "signed in");
            Ok(SessionGrant {
                token,
                expires: now + signer.ttl(),
            })
        })
    }

    /// Extends the caller's session and returns a refreshed token.
    pub fn check_session(&self, ctx: &RequestContext) -> Result<SessionGrant> {
        let signer = self.signer()?;
        self.inner.store.write(|tx| {
            let mut user = self.inner.binder.verify(tx, &ctx.source, ctx.token())?;
            let now = Utc::now();
            let token = signer.prolong(&mut user, now)?;
            Registry::save_user(tx, &user)?;
            Ok(SessionGrant {
                token,
                expires: now + signer.ttl(),
            })
        })
    }

    /// Ends the caller's session; every token minted for it stops working.
    pub fn sign_out(&self, ctx: &RequestContext) -> Result<()> {
        self.signer()?;
        self.inner.store.write(|tx| {
            let mut user = self.inner.binder.verify(tx, &ctx.source, ctx.token())?;
            SessionSigner::revoke(&mut user);
            Registry::save_user(tx, &user)?;
            info!(user = %user.id, "signed out");
            Ok(())
        })
    }
}
