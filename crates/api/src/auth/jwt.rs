//! Bearer access tokens.
//!
//! Tokens are HS256 JWTs minted by the identity service; this server only
//! verifies them. Besides the user id and role, a token carries the
//! caller's registered phone number, because shared keys and delivery rents
//! are addressed by phone and must be matched without a user lookup.

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use smartbox_core::delegation::normalize_phone;
use smartbox_core::roles::Role;
use smartbox_core::types::{DbId, Timestamp};
use uuid::Uuid;

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The user's internal database id.
    pub sub: DbId,
    pub phone: String,
    /// Unknown role names fail deserialization, and with it verification.
    pub role: Role,
    /// Expiry (Unix seconds).
    pub exp: i64,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Token id, logged on rejection.
    pub jti: String,
}

impl Claims {
    pub fn new(user_id: DbId, phone: &str, role: Role, issued_at: Timestamp, ttl: Duration) -> Self {
        Self {
            sub: user_id,
            phone: phone.to_string(),
            role,
            exp: (issued_at + ttl).timestamp(),
            iat: issued_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),

    #[error("token {jti} carries a malformed phone number")]
    MalformedPhone { jti: String },
}

/// Signing and verification settings.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret shared with the identity service.
    pub secret: String,
    /// Lifetime of tokens minted by [`JwtConfig::issue`].
    pub token_ttl_mins: i64,
    /// Clock skew tolerated when checking `exp`.
    pub leeway_secs: u64,
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var           | Required | Default |
    /// |-------------------|----------|---------|
    /// | `JWT_SECRET`      | **yes**  | --      |
    /// | `JWT_TTL_MINS`    | no       | `60`    |
    /// | `JWT_LEEWAY_SECS` | no       | `30`    |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is missing or empty, or a number fails to parse.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let parse = |key: &str, default: &str| {
            std::env::var(key)
                .unwrap_or_else(|_| default.into())
                .parse::<i64>()
                .unwrap_or_else(|_| panic!("{key} must be a whole number"))
        };
        let leeway_secs = parse("JWT_LEEWAY_SECS", "30");
        assert!(leeway_secs >= 0, "JWT_LEEWAY_SECS must not be negative");

        Self {
            secret,
            token_ttl_mins: parse("JWT_TTL_MINS", "60"),
            leeway_secs: leeway_secs as u64,
        }
    }

    /// Mint a token for a user. Used by provisioning scripts and tests.
    pub fn issue(
        &self,
        user_id: DbId,
        phone: &str,
        role: Role,
        now: Timestamp,
    ) -> Result<String, TokenError> {
        let claims = Claims::new(user_id, phone, role, now, Duration::minutes(self.token_ttl_mins));
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let token = encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Check signature, expiry (with leeway), role and phone format. The
    /// returned phone is in canonical local form.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        validation.set_required_spec_claims(&["exp"]);

        let mut claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )?
        .claims;

        match normalize_phone(&claims.phone) {
            Ok(phone) => claims.phone = phone,
            Err(_) => return Err(TokenError::MalformedPhone { jti: claims.jti }),
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn config(secret: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.to_string(),
            token_ttl_mins: 60,
            leeway_secs: 30,
        }
    }

    #[test]
    fn issued_token_verifies() {
        let config = config("secret-alpha");
        let token = config.issue(42, "0901234567", Role::Admin, Utc::now()).unwrap();

        let claims = config.verify(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.phone, "0901234567");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn expiry_honours_leeway() {
        let config = config("secret-alpha");

        let barely = Utc::now() - Duration::minutes(60) - Duration::seconds(10);
        let token = config.issue(1, "0901234567", Role::User, barely).unwrap();
        assert!(config.verify(&token).is_ok());

        let long_ago = Utc::now() - Duration::hours(3);
        let token = config.issue(1, "0901234567", Role::User, long_ago).unwrap();
        assert_matches!(config.verify(&token), Err(TokenError::Rejected(_)));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = config("secret-alpha")
            .issue(1, "0901234567", Role::User, Utc::now())
            .unwrap();

        assert_matches!(config("secret-bravo").verify(&token), Err(TokenError::Rejected(_)));
    }

    #[test]
    fn unknown_role_is_rejected() {
        #[derive(Serialize)]
        struct Forged<'a> {
            sub: DbId,
            phone: &'a str,
            role: &'a str,
            exp: i64,
            iat: i64,
            jti: &'a str,
        }

        let config = config("secret-alpha");
        let now = Utc::now().timestamp();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Forged {
                sub: 1,
                phone: "0901234567",
                role: "superuser",
                exp: now + 600,
                iat: now,
                jti: "forged",
            },
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert_matches!(config.verify(&token), Err(TokenError::Rejected(_)));
    }

    #[test]
    fn international_phone_is_canonicalized() {
        let config = config("secret-alpha");
        let token = config.issue(7, "+84901234567", Role::User, Utc::now()).unwrap();

        assert_eq!(config.verify(&token).unwrap().phone, "0901234567");
    }

    #[test]
    fn malformed_phone_is_rejected() {
        let config = config("secret-alpha");
        let token = config.issue(1, "12345", Role::User, Utc::now()).unwrap();

        assert_matches!(config.verify(&token), Err(TokenError::MalformedPhone { .. }));
    }
}
