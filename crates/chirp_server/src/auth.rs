//! Authentication support for the reference server.
//!
//! Bearer tokens are HMAC-SHA256 signed and carry their issue time for
//! expiration checking.
//!
//! ## Token Format
//!
//! `<user_id>.<issued_at_millis>.<hex signature>`, where the signature
//! covers `<user_id>.<issued_at_millis>`.
//!
//! Passwords are stored as `hex(sha256(salt ":" password))` with the
//! user's ID as salt.

use crate::error::{ServerError, ServerResult};
use chirp_protocol::UserId;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates an auth configuration with a 24 hour token lifetime.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the token expiration duration.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Issues and validates bearer tokens.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issues a token for `user_id`.
    pub fn create_token(&self, user_id: &UserId) -> ServerResult<String> {
        self.create_token_at(user_id, now_millis())
    }

    fn create_token_at(&self, user_id: &UserId, issued_at: u64) -> ServerResult<String> {
        let payload = format!("{user_id}.{issued_at}");
        let mac = self.mac(payload.as_bytes())?;
        Ok(format!(
            "{payload}.{}",
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Validates a token and returns the user it was issued to.
    pub fn validate_token(&self, token: &str) -> ServerResult<UserId> {
        let mut parts = token.rsplitn(3, '.');
        let (Some(signature), Some(issued_at), Some(user_id)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ServerError::NotAuthorized("Malformed token".into()));
        };

        let payload = &token[..token.len() - signature.len() - 1];
        let signature = hex::decode(signature)
            .map_err(|_| ServerError::NotAuthorized("Malformed token".into()))?;
        self.mac(payload.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| ServerError::NotAuthorized("Invalid signature".into()))?;

        let issued_at: u64 = issued_at
            .parse()
            .map_err(|_| ServerError::NotAuthorized("Malformed token".into()))?;
        let expiry = self.config.token_expiry.as_millis() as u64;
        if now_millis() > issued_at.saturating_add(expiry) {
            return Err(ServerError::NotAuthorized("Token expired".into()));
        }

        Ok(UserId::new(user_id))
    }

    fn mac(&self, data: &[u8]) -> ServerResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        mac.update(data);
        Ok(mac)
    }
}

/// Hashes a password with a per-user salt.
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> TokenValidator {
        TokenValidator::new(AuthConfig::new(b"test-secret-key-32-bytes-long!!".to_vec()))
    }

    #[test]
    fn create_and_validate_token() {
        let validator = validator();
        let user = UserId::new("3f2a9c1e-u1");

        let token = validator.create_token(&user).unwrap();

        assert_eq!(validator.validate_token(&token).unwrap(), user);
    }

    #[test]
    fn reject_tampered_token() {
        let validator = validator();
        let token = validator.create_token(&UserId::new("u1")).unwrap();

        let forged = token.replacen("u1", "u2", 1);
        assert!(validator.validate_token(&forged).is_err());

        let mut flipped = token.clone();
        let last = flipped.pop().unwrap();
        flipped.push(if last == '0' { '1' } else { '0' });
        assert!(validator.validate_token(&flipped).is_err());
    }

    #[test]
    fn reject_foreign_secret() {
        let other = TokenValidator::new(AuthConfig::new(b"another-secret".to_vec()));
        let token = other.create_token(&UserId::new("u1")).unwrap();

        assert!(validator().validate_token(&token).is_err());
    }

    #[test]
    fn reject_expired_token() {
        let validator = validator();
        let day_ago = now_millis() - 25 * 60 * 60 * 1000;
        let token = validator
            .create_token_at(&UserId::new("u1"), day_ago)
            .unwrap();

        assert_eq!(
            validator.validate_token(&token),
            Err(ServerError::NotAuthorized("Token expired".into()))
        );
    }

    #[test]
    fn reject_garbage() {
        let validator = validator();
        assert!(validator.validate_token("").is_err());
        assert!(validator.validate_token("abc").is_err());
        assert!(validator.validate_token("u1.123.zz").is_err());
    }

    #[test]
    fn password_hash_is_salted() {
        assert_eq!(hash_password("u1", "pw"), hash_password("u1", "pw"));
        assert_ne!(hash_password("u1", "pw"), hash_password("u2", "pw"));
        assert_eq!(hash_password("u1", "pw").len(), 64);
    }

    proptest::proptest! {
        #[test]
        fn any_user_id_survives_signing(id in "[a-zA-Z0-9._-]{1,40}") {
            let validator = validator();
            let token = validator.create_token(&UserId::new(id.clone())).unwrap();
            proptest::prop_assert_eq!(validator.validate_token(&token).unwrap(), UserId::new(id));
        }
    }
}
