/// JWT Claims structure
///
/// The access token payload binds user id, email, role and the refresh
/// session it was minted under, plus the standard RFC 7519 claims.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Role;
use crate::error::{AppError, AuthError};

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Refresh session the token belongs to
    pub sid: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(identity: &Identity, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            role: identity.role,
            sid: identity.session_id.to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }
}

/// Authenticated caller, attached to the request after the bearer token
/// has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub session_id: Uuid,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl TryFrom<Claims> for Identity {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::TokenInvalid)?;
        let session_id = Uuid::parse_str(&claims.sid).map_err(|_| AuthError::TokenInvalid)?;
        Ok(Identity {
            id,
            email: claims.email,
            role: claims.role,
            session_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            role: Role::Agent,
            session_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_claims_round_trip_to_identity() {
        let identity = identity();
        let claims = Claims::new(&identity, 3600, "test".to_string());

        assert_eq!(claims.iss, "test");
        assert!(claims.exp > chrono::Utc::now().timestamp());
        assert_eq!(Identity::try_from(claims).unwrap(), identity);
    }

    #[test]
    fn test_invalid_subject_rejected() {
        let mut claims = Claims::new(&identity(), 3600, "test".to_string());
        claims.sub = "invalid-uuid".to_string();

        assert!(Identity::try_from(claims).is_err());
    }
}
