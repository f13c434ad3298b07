//! Second-factor secrets.
//!
//! Managers get a TOTP secret when they are promoted. Issuing the secret
//! and checking codes both sit behind traits; the crate only ships the
//! issuer.

use data_encoding::BASE32;
use rand::RngCore;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::CoreError;

/// Seconds per code.
pub const OTP_PERIOD: u32 = 30;
const SECRET_BYTES: usize = 20;

/// A freshly issued secret and the URI authenticator apps scan.
pub struct IssuedSecret {
    pub secret: SecretString,
    pub provisioning_uri: String,
}

impl std::fmt::Debug for IssuedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedSecret")
            .field("secret", &"[redacted]")
            .finish_non_exhaustive()
    }
}

pub trait SecretIssuer: Send + Sync {
    fn issue(&self, account: &str) -> Result<IssuedSecret, CoreError>;
}

/// Checks a one-time code against a user's stored secret.
pub trait OtpVerifier: Send + Sync {
    fn verify(&self, secret: &str, code: &str) -> bool;
}

/// Draws random secrets and labels them with a fixed issuer.
#[derive(Debug, Clone)]
pub struct RandomSecretIssuer {
    issuer: String,
}

impl RandomSecretIssuer {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }
}

impl SecretIssuer for RandomSecretIssuer {
    fn issue(&self, account: &str) -> Result<IssuedSecret, CoreError> {
        let mut bytes = [0_u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let secret = SecretString::from(BASE32.encode(&bytes));
        let provisioning_uri = provisioning_uri(&self.issuer, account, &secret)?;
        Ok(IssuedSecret {
            secret,
            provisioning_uri,
        })
    }
}

/// Builds `otpauth://totp/{issuer}:{account}?secret=..&issuer=..&period=30`.
pub fn provisioning_uri(
    issuer: &str,
    account: &str,
    secret: &SecretString,
) -> Result<String, CoreError> {
    let mut url = Url::parse("otpauth://totp/")
        .map_err(|e| CoreError::validation("otp_issuer", e.to_string()))?;
    url.set_path(&format!("{issuer}:{account}"));
    url.query_pairs_mut()
        .append_pair("secret", secret.expose_secret())
        .append_pair("issuer", issuer)
        .append_pair("period", &OTP_PERIOD.to_string());
    Ok(url.into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn issues_base32_secret_of_twenty_bytes() {
        let issued = RandomSecretIssuer::new("wgnet").issue("ann").unwrap();
        let decoded = BASE32
            .decode(issued.secret.expose_secret().as_bytes())
            .unwrap();
        assert_eq!(decoded.len(), SECRET_BYTES);
    }

    #[test]
    fn uri_carries_issuer_account_and_secret() {
        let issued = RandomSecretIssuer::new("wgnet").issue("ann").unwrap();
        let url = Url::parse(&issued.provisioning_uri).unwrap();
        assert_eq!(url.scheme(), "otpauth");
        assert!(url.path().ends_with("wgnet:ann"));

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("issuer".into(), "wgnet".into())));
        assert!(pairs.contains(&("period".into(), "30".into())));
        assert!(pairs.contains(&(
            "secret".into(),
            issued.secret.expose_secret().to_owned()
        )));
    }

    #[test]
    fn secrets_differ() {
        let issuer = RandomSecretIssuer::new("wgnet");
        let a = issuer.issue("a").unwrap();
        let b = issuer.issue("a").unwrap();
        assert_ne!(a.secret.expose_secret(), b.secret.expose_secret());
    }
}
