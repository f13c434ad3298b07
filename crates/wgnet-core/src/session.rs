//! Signed manager sessions.
//!
//! A token is `base64url(claims).base64url(hmac_sha256(secret, claims))`.
//! The claims name the user, an expiry, and a random nonce that must also
//! be stored on the user record, so revoking the stored session kills
//! every token minted for it even before expiry.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{StoredSession, User, UserId};
use crate::registry::Registry;
use crate::store::Snapshot;

type HmacSha256 = Hmac<Sha256>;
type Result<T> = std::result::Result<T, CoreError>;

const NONCE_LEN: usize = 20;

/// Maps a presented token to the user it belongs to.
pub trait SessionResolver: Send + Sync {
    fn resolve(&self, tx: &dyn Snapshot, token: &str) -> Result<User>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Claims {
    uid: UserId,
    exp: i64,
    nonce: String,
}

pub struct SessionSigner {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionSigner {
    pub fn new(secret: SecretString, ttl: Duration) -> Result<Self> {
        if secret.expose_secret().is_empty() {
            return Err(CoreError::validation("session_secret", "must not be empty"));
        }
        if ttl <= Duration::zero() {
            return Err(CoreError::validation("session_ttl", "must be positive"));
        }
        Ok(Self { secret, ttl })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Starts a new session on `user` and returns its token.
    pub fn issue(&self, user: &mut User, now: DateTime<Utc>) -> Result<String> {
        if !user.is_manager {
            return Err(CoreError::unauthorized("sessions are for managers only"));
        }
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        let session = StoredSession {
            nonce,
            expires: now + self.ttl,
        };
        let token = self.sign(user.id, &session)?;
        user.session = Some(session);
        Ok(token)
    }

    /// Pushes an unexpired session's expiry out by one TTL, keeping its
    /// nonce, and returns a fresh token.
    pub fn prolong(&self, user: &mut User, now: DateTime<Utc>) -> Result<String> {
        if !user.is_manager {
            return Err(CoreError::unauthorized("sessions are for managers only"));
        }
        let Some(session) = user.session.as_mut() else {
            return Err(CoreError::unauthorized("no active session"));
        };
        if session.expires <= now {
            return Err(CoreError::unauthorized("session expired"));
        }
        session.expires = now + self.ttl;
        let session = session.clone();
        self.sign(user.id, &session)
    }

    pub fn revoke(user: &mut User) {
        user.session = None;
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| CoreError::validation("session_secret", e.to_string()))
    }

    fn sign(&self, uid: UserId, session: &StoredSession) -> Result<String> {
        let claims = Claims {
            uid,
            exp: session.expires.timestamp(),
            nonce: session.nonce.clone(),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| CoreError::validation("session", e.to_string()))?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Checks signature and expiry. Says nothing about the stored session.
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| CoreError::unauthorized("malformed token"))?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| CoreError::unauthorized("malformed token payload"))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| CoreError::unauthorized("malformed token signature"))?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| CoreError::unauthorized("bad token signature"))?;

        let claims: Claims = serde_json::from_slice(&payload)
            .map_err(|_| CoreError::unauthorized("malformed token claims"))?;
        if claims.exp <= now.timestamp() {
            return Err(CoreError::unauthorized("token expired"));
        }
        Ok(claims)
    }

    /// Full resolution at an explicit instant.
    pub fn resolve_at(&self, tx: &dyn Snapshot, token: &str, now: DateTime<Utc>) -> Result<User> {
        let claims = self.verify(token, now)?;
        let user = Registry::user_record(tx, claims.uid)
            .map_err(|_| CoreError::unauthorized("token names an unknown user"))?;

        if !user.is_manager {
            return Err(CoreError::unauthorized("user is not a manager"));
        }
        match &user.session {
            Some(stored) if stored.nonce == claims.nonce && stored.expires > now => {
                debug!(user = %user.id, "session resolved");
                Ok(user)
            }
            Some(_) => Err(CoreError::unauthorized("session superseded or expired")),
            None => Err(CoreError::unauthorized("no active session")),
        }
    }
}

impl SessionResolver for SessionSigner {
    fn resolve(&self, tx: &dyn Snapshot, token: &str) -> Result<User> {
        self.resolve_at(tx, token, Utc::now())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::Bucket;
    use crate::store::tests::temp_store;

    fn signer(secret: &str) -> SessionSigner {
        SessionSigner::new(SecretString::from(secret.to_owned()), Duration::minutes(5)).unwrap()
    }

    fn manager() -> User {
        let mut user = User::new("ann");
        user.is_manager = true;
        user
    }

    fn save(store: &crate::store::Store, user: &User) {
        store
            .write(|tx| tx.put_json(Bucket::Users, user.id.as_bytes(), user))
            .unwrap();
    }

    #[test]
    fn issued_token_resolves() {
        let (_dir, store) = temp_store();
        let signer = signer("s3cret");
        let mut user = manager();
        let token = signer.issue(&mut user, Utc::now()).unwrap();
        save(&store, &user);

        let resolved = store.read(|tx| signer.resolve(tx, &token)).unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[test]
    fn non_managers_cannot_hold_sessions() {
        let mut user = User::new("bob");
        assert!(signer("s").issue(&mut user, Utc::now()).is_err());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let (_dir, store) = temp_store();
        let mut user = manager();
        let token = signer("one").issue(&mut user, Utc::now()).unwrap();
        save(&store, &user);

        let err = store.read(|tx| signer("two").resolve(tx, &token)).unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let (_dir, store) = temp_store();
        let signer = signer("s3cret");
        let mut user = manager();
        let token = signer.issue(&mut user, Utc::now()).unwrap();
        save(&store, &user);

        let (_, sig) = token.split_once('.').unwrap();
        let forged = Claims {
            uid: user.id,
            exp: i64::MAX,
            nonce: user.session.clone().unwrap().nonce,
        };
        let forged = format!(
            "{}.{sig}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap())
        );
        assert!(store.read(|tx| signer.resolve(tx, &forged)).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let (_dir, store) = temp_store();
        let signer = signer("s3cret");
        let mut user = manager();
        let issued_at = Utc::now() - Duration::minutes(10);
        let token = signer.issue(&mut user, issued_at).unwrap();
        save(&store, &user);

        assert!(store.read(|tx| signer.resolve(tx, &token)).is_err());
    }

    #[test]
    fn revoked_session_stops_resolving() {
        let (_dir, store) = temp_store();
        let signer = signer("s3cret");
        let mut user = manager();
        let token = signer.issue(&mut user, Utc::now()).unwrap();
        SessionSigner::revoke(&mut user);
        save(&store, &user);

        assert!(store.read(|tx| signer.resolve(tx, &token)).is_err());
    }

    #[test]
    fn reissue_supersedes_old_token() {
        let (_dir, store) = temp_store();
        let signer = signer("s3cret");
        let mut user = manager();
        let old = signer.issue(&mut user, Utc::now()).unwrap();
        let new = signer.issue(&mut user, Utc::now()).unwrap();
        save(&store, &user);

        assert!(store.read(|tx| signer.resolve(tx, &old)).is_err());
        assert!(store.read(|tx| signer.resolve(tx, &new)).is_ok());
    }

    #[test]
    fn prolong_keeps_nonce_and_extends_expiry() {
        let signer = signer("s3cret");
        let mut user = manager();
        let start = Utc::now();
        signer.issue(&mut user, start).unwrap();
        let nonce = user.session.clone().unwrap().nonce;

        let later = start + Duration::minutes(3);
        signer.prolong(&mut user, later).unwrap();

        let session = user.session.unwrap();
        assert_eq!(session.nonce, nonce);
        assert_eq!(session.expires, later + Duration::minutes(5));
    }

    #[test]
    fn prolong_refuses_expired_session() {
        let signer = signer("s3cret");
        let mut user = manager();
        let start = Utc::now();
        signer.issue(&mut user, start).unwrap();
        assert!(signer.prolong(&mut user, start + Duration::minutes(6)).is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        let empty = SecretString::from(String::new());
        assert!(SessionSigner::new(empty, Duration::minutes(5)).is_err());
    }
}
