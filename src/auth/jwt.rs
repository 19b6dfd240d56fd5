//! HS256 bearer tokens carrying the caller's identity.

use anyhow::{Context, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

use crate::access::Identity;
use crate::db::{Role, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id as a string
    pub sub: String,
    pub role: Role,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn identity(&self) -> Result<Identity> {
        let user_id = self.sub.parse::<i64>().context("Token subject is not a user id")?;
        Ok(Identity::new(user_id, self.role))
    }
}

pub fn encode_jwt(user: &User, secret: &str, expiry_secs: u64) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role,
        email: user.email.clone(),
        iat: now,
        exp: now.saturating_add(i64::try_from(expiry_secs).unwrap_or(i64::MAX)),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("Failed to encode JWT")
}

/// Decode a token, rejecting bad signatures and expired tokens.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims> {
    let token_data: TokenData<Claims> = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .context("Failed to decode JWT")?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-minimum-32-chars!!";

    fn user(id: i64, role: Role) -> User {
        let now = chrono::Utc::now();
        User {
            id,
            full_name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let token = encode_jwt(&user(7, Role::Employee), TEST_SECRET, 3600).expect("encode should succeed");

        let claims = decode_jwt(&token, TEST_SECRET).expect("decode should succeed");
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.identity().unwrap(), Identity::new(7, Role::Employee));
    }

    #[test]
    fn test_expired_token_rejected() {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "1".to_string(),
            role: Role::Admin,
            email: "bob@example.com".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .expect("encode should succeed");

        assert!(decode_jwt(&token, TEST_SECRET).is_err(), "expired token should be rejected");
    }

    #[test]
    fn test_huge_expiry_saturates() {
        let token = encode_jwt(&user(3, Role::Employee), TEST_SECRET, u64::MAX).unwrap();
        let claims = decode_jwt(&token, TEST_SECRET).unwrap();
        assert_eq!(claims.exp, i64::MAX);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_invalid_secret_rejected() {
        let token = encode_jwt(&user(1, Role::Admin), TEST_SECRET, 3600).unwrap();
        assert!(decode_jwt(&token, "wrong-secret-that-is-also-32chars!").is_err());
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert!(decode_jwt("not.a.valid.jwt", TEST_SECRET).is_err());
        assert!(decode_jwt("", TEST_SECRET).is_err());
    }
}
