//! Authentication
//!
//! Console users present a JWT whose claims carry everything a [`Session`]
//! needs: the user id, the short user code used in site ids and a display
//! name for the initials fallback.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::{Session, UserId};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Short code embedded in site identifiers
    #[serde(default)]
    pub user_code: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// Builds the session the registry operations run under
    pub fn session(&self) -> Result<Session, AuthError> {
        let user_id: UserId = self.sub.parse().map_err(|_| AuthError::InvalidSubject)?;
        Ok(Session::new(user_id, self.user_code.clone(), self.name.clone()))
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token subject is not a user id")]
    InvalidSubject,
}

/// Issues a token for `session`, valid for `expiration_secs`
pub fn create_token(
    session: &Session,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: session.user_id.as_uuid().to_string(),
        user_code: session.user_code.clone(),
        name: session.display_name.clone(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn test_token_round_trip_keeps_session() {
        let session = Session::new(UserId::new(), "AB", "Anil Bansal");
        let token = create_token(&session, SECRET, 60).unwrap();

        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.session().unwrap(), session);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let session = Session::new(UserId::new(), "AB", "Anil Bansal");
        let token = create_token(&session, SECRET, 60).unwrap();
        assert!(matches!(validate_token(&token, "other"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_subject_must_be_a_user_id() {
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            user_code: String::new(),
            name: String::new(),
            exp: 0,
            iat: 0,
        };
        assert!(matches!(claims.session(), Err(AuthError::InvalidSubject)));
    }
}
