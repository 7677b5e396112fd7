/// Access token issuance and verification (HS256).
///
/// Access tokens are stateless: there is no server-side revocation list.
/// A revoked refresh session stops the holder at the next refresh.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};

use crate::auth::claims::{Claims, Identity};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Sign a short-lived access token for `identity`.
pub fn generate_access_token(identity: &Identity, config: &JwtSettings) -> Result<String, AppError> {
    let claims = Claims::new(identity, config.access_token_expiry, config.issuer.clone());

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Verify signature, issuer and expiry, and return the caller's identity.
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<Identity, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = 0;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        match e.kind() {
            ErrorKind::ExpiredSignature => AppError::Auth(AuthError::TokenExpired),
            _ => AppError::Auth(AuthError::TokenInvalid),
        }
    })?;

    Identity::try_from(claims)
}
