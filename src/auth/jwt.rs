//! JWT token generation and validation
//!
//! Issues an HS256 access/refresh token pair per login. The validator is
//! constructed from configuration at startup and lives in `AppState`; there
//! is no process-global secret.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::db::schemas::UserDoc;
use crate::types::{Error, Result};

/// Claims carried in every token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Issued-at (unix seconds)
    pub iat: i64,
}

/// Access/refresh token pair returned to a client
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Issues and validates JWT tokens
#[derive(Clone)]
pub struct JwtValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_expiry_secs: u64,
    refresh_expiry_secs: u64,
}

impl JwtValidator {
    pub fn new(secret: &str, access_expiry_secs: u64, refresh_expiry_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_expiry_secs,
            refresh_expiry_secs,
        }
    }

    /// Generate an access/refresh token pair for a user
    pub fn issue_pair(&self, user: &UserDoc) -> Result<TokenPair> {
        let access_token = self.issue_token(user, self.access_expiry_secs)?;
        let refresh_token = self.issue_token(user, self.refresh_expiry_secs)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_expiry_secs,
        })
    }

    fn issue_token(&self, user: &UserDoc, expiry_secs: u64) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            exp: now + expiry_secs as i64,
            iat: now,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Validate a token and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| Error::Unauthorized("Invalid token".to_string()))
    }
}

/// Extract a bearer token from an Authorization header value
pub fn extract_token_from_header(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user() -> UserDoc {
        let mut user = UserDoc::new(
            "user-1".to_string(),
            "alice@example.com".to_string(),
            "Alice".to_string(),
            String::new(),
        );
        user.role = Role::Researcher;
        user
    }

    fn validator() -> JwtValidator {
        JwtValidator::new("test-secret", 3600, 604800)
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let jwt = validator();
        let pair = jwt.issue_pair(&test_user()).unwrap();

        let claims = jwt.verify(&pair.access_token).unwrap();
        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.role, Role::Researcher);
        assert_eq!(pair.expires_in, 3600);
    }

    #[test]
    fn test_refresh_token_carries_same_identity() {
        let jwt = validator();
        let pair = jwt.issue_pair(&test_user()).unwrap();

        let claims = jwt.verify(&pair.refresh_token).unwrap();
        assert_eq!(claims.user_id, "user-1");
        assert!(claims.exp > Utc::now().timestamp() + 600_000);
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = validator();
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: "user-1".to_string(),
            email: "alice@example.com".to_string(),
            role: Role::Observer,
            exp: now - 120,
            iat: now - 3720,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(jwt.verify(&token).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let jwt = validator();
        let pair = jwt.issue_pair(&test_user()).unwrap();

        let other = JwtValidator::new("other-secret", 3600, 604800);
        assert!(other.verify(&pair.access_token).is_err());
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_token_from_header("bearer abc123"), Some("abc123"));
        assert_eq!(extract_token_from_header("Basic abc123"), None);
        assert_eq!(extract_token_from_header("Bearer "), None);
    }
}
