//! The authorization gate.
//!
//! A caller is authorized only when three independent facts agree: the
//! network source address belongs to a known device, the session token
//! resolves to a user, and that user owns the device. The check runs
//! inside the caller's transaction so it sees the same snapshot as the
//! operation it guards.

use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::User;
use crate::registry::Registry;
use crate::session::SessionResolver;
use crate::store::Snapshot;

type Result<T> = std::result::Result<T, CoreError>;

/// Outcome of a successful [`IdentityBinder::authorize`].
#[derive(Debug, Clone)]
pub enum Authorization {
    /// Identity verified. `session` is echoed back to the caller.
    Authorized { user: User, session: String },
    /// Authorization is disabled for this deployment.
    Bypassed,
}

impl Authorization {
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authorized { user, .. } => Some(user),
            Self::Bypassed => None,
        }
    }

    /// Token to tag the response with, if any.
    pub fn session_echo(&self) -> Option<&str> {
        match self {
            Self::Authorized { session, .. } => Some(session),
            Self::Bypassed => None,
        }
    }
}

#[derive(Clone)]
pub struct IdentityBinder {
    resolver: Arc<dyn SessionResolver>,
    required: bool,
}

impl std::fmt::Debug for IdentityBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityBinder")
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

impl IdentityBinder {
    pub fn new(resolver: Arc<dyn SessionResolver>, required: bool) -> Self {
        Self { resolver, required }
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn authorize(&self, tx: &dyn Snapshot, source: &str, token: &str) -> Result<Authorization> {
        if !self.required {
            return Ok(Authorization::Bypassed);
        }
        self.verify(tx, source, token)
            .inspect_err(|err| {
                if let CoreError::Unauthorized { reason } = err {
                    warn!(%source, %reason, "request rejected");
                }
            })
            .map(|user| {
                debug!(%source, user = %user.id, "request authorized");
                Authorization::Authorized {
                    user,
                    session: token.to_owned(),
                }
            })
    }

    /// The full three-way check, regardless of whether the gate is
    /// required. Session maintenance always goes through here.
    pub fn verify(&self, tx: &dyn Snapshot, source: &str, token: &str) -> Result<User> {
        let source: Ipv4Addr = source
            .trim()
            .parse()
            .map_err(|_| CoreError::unauthorized("source is not an IPv4 address"))?;
        if source.is_unspecified() || source.is_broadcast() || source.is_multicast() {
            return Err(CoreError::unauthorized("source is not a host address"));
        }

        if token.is_empty() {
            return Err(CoreError::unauthorized("missing session token"));
        }

        let device = Registry::device_record(tx, source).map_err(|err| match err {
            CoreError::NotFound { .. } => CoreError::unauthorized("no device at source"),
            other => other,
        })?;

        let user = self.resolver.resolve(tx, token).map_err(|err| match err {
            CoreError::Store { .. } => err,
            other => CoreError::unauthorized(format!("session did not resolve: {other}")),
        })?;

        if device.owner != user.id {
            return Err(CoreError::unauthorized(format!(
                "device {source} belongs to {}, session to {}",
                device.owner, user.id
            )));
        }
        Ok(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Device, PeerKey};
    use crate::store::tests::temp_store;
    use crate::store::{Bucket, Store};

    /// Resolves the token string as a user id.
    struct TokenIsUserId;

    impl SessionResolver for TokenIsUserId {
        fn resolve(&self, tx: &dyn Snapshot, token: &str) -> Result<User> {
            Registry::user_record(tx, token.parse()?)
        }
    }

    fn seed(store: &Store) -> (User, User) {
        let owner = User::new("owner");
        let other = User::new("other");
        let device = Device {
            inet: "10.0.0.7/24".parse().unwrap(),
            public_key: PeerKey::from_bytes([7; 32]),
            label: "phone".into(),
            wan_forward: false,
            owner: owner.id,
        };
        store
            .write(|tx| {
                tx.put_json(Bucket::Users, owner.id.as_bytes(), &owner)?;
                tx.put_json(Bucket::Users, other.id.as_bytes(), &other)?;
                tx.put_json(Bucket::Devices, &device.address().octets(), &device)
            })
            .unwrap();
        (owner, other)
    }

    fn binder() -> IdentityBinder {
        IdentityBinder::new(Arc::new(TokenIsUserId), true)
    }

    fn is_unauthorized(result: Result<Authorization>) -> bool {
        matches!(result, Err(CoreError::Unauthorized { .. }))
    }

    #[test]
    fn owner_from_own_device_is_authorized() {
        let (_dir, store) = temp_store();
        let (owner, _) = seed(&store);
        let token = owner.id.to_string();

        let auth = store
            .read(|tx| binder().authorize(tx, "10.0.0.7", &token))
            .unwrap();
        assert_eq!(auth.user().unwrap().id, owner.id);
        assert_eq!(auth.session_echo(), Some(token.as_str()));
    }

    #[test]
    fn session_of_someone_else_is_rejected() {
        let (_dir, store) = temp_store();
        let (_, other) = seed(&store);
        let token = other.id.to_string();
        assert!(is_unauthorized(
            store.read(|tx| binder().authorize(tx, "10.0.0.7", &token))
        ));
    }

    #[test]
    fn each_step_rejects() {
        let (_dir, store) = temp_store();
        let (owner, _) = seed(&store);
        let token = owner.id.to_string();

        store
            .read(|tx| {
                let binder = binder();
                assert!(is_unauthorized(binder.authorize(tx, "not-an-ip", &token)));
                assert!(is_unauthorized(binder.authorize(tx, "::1", &token)));
                assert!(is_unauthorized(binder.authorize(tx, "10.0.0.7", "")));
                assert!(is_unauthorized(binder.authorize(tx, "10.0.0.8", &token)));
                assert!(is_unauthorized(binder.authorize(tx, "10.0.0.7", "garbage")));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn disabled_gate_bypasses_everything() {
        let (_dir, store) = temp_store();
        let binder = IdentityBinder::new(Arc::new(TokenIsUserId), false);
        let auth = store.read(|tx| binder.authorize(tx, "junk", "")).unwrap();
        assert!(matches!(auth, Authorization::Bypassed));
        assert!(auth.session_echo().is_none());
    }

    #[test]
    fn public_message_does_not_leak_reason() {
        let (_dir, store) = temp_store();
        seed(&store);
        let err = store
            .read(|tx| binder().authorize(tx, "10.0.0.8", "x"))
            .unwrap_err();
        assert_eq!(err.public_message(), "unauthorized");
    }
}
