//! Authentication Routes
//!
//! Registration, login, refresh-token rotation, logout, profile, and the
//! password-reset and email-verification flows.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::cookie::{read_refresh_cookie, refresh_cookie, removal_cookie};
use crate::auth::{
    ForgotPasswordRequest, Identity, LoginRequest, RegisterRequest, ResetPasswordRequest,
    VerifyEmailRequest,
};
use crate::domain::PublicUser;
use crate::error::AppError;
use crate::startup::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: PublicUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_token: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn message(text: &str) -> serde_json::Value {
    serde_json::json!({ "message": text })
}

/// POST /auth/register
///
/// Self-registration. The account always gets the `user` role; any `role`
/// field in the body is ignored.
///
/// # Errors
/// - 400: Missing or invalid email/password/name
/// - 409: Email already registered
pub async fn register(
    body: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let registration = state.auth.register(body.into_inner()).await?;

    Ok(HttpResponse::Created().json(RegisterResponse {
        user: registration.user,
        verify_token: registration.verify_token,
    }))
}

/// POST /auth/login
///
/// Returns the access token in the body and sets the `refreshToken` cookie.
///
/// # Errors
/// - 400: Missing email or password
/// - 401: Unknown email or wrong password (same response for both)
pub async fn login(
    body: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let outcome = state.auth.login(body.into_inner()).await?;
    let secure = state.environment.is_production();

    Ok(HttpResponse::Ok()
        .cookie(refresh_cookie(
            &outcome.tokens.refresh_token,
            outcome.tokens.refresh_max_age,
            secure,
        ))
        .json(LoginResponse {
            token: outcome.tokens.access_token,
            user: outcome.user,
        }))
}

/// POST /auth/refresh
///
/// Rotates the refresh cookie and returns a new access token. A token that
/// was already rotated no longer matches and is rejected.
///
/// # Errors
/// - 401: Cookie absent, unknown, already rotated or expired
pub async fn refresh(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let presented = read_refresh_cookie(&req);
    let tokens = state.auth.refresh(presented.as_deref()).await?;

    Ok(HttpResponse::Ok()
        .cookie(refresh_cookie(
            &tokens.refresh_token,
            tokens.refresh_max_age,
            state.environment.is_production(),
        ))
        .json(TokenResponse {
            token: tokens.access_token,
        }))
}

/// POST /auth/logout
///
/// Revokes the session behind the cookie, if any, and clears the cookie.
/// Always 200.
pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let presented = read_refresh_cookie(&req);
    state.auth.logout(presented.as_deref()).await?;

    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(state.environment.is_production()))
        .json(message("Logged out")))
}

/// GET /auth/profile
pub async fn get_profile(
    identity: Option<Identity>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = state.auth.get_profile(identity.as_ref()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "user": user })))
}

/// POST /auth/forgot-password
///
/// Same response whether or not the account exists. Outside production the
/// reset token is included so it can be used directly.
///
/// # Errors
/// - 400: Missing email
/// - 429: Too many requests for this email
pub async fn forgot_password(
    body: web::Json<ForgotPasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let issued = state.auth.forgot_password(body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(ForgotPasswordResponse {
        message: "If the account exists, a reset link has been sent",
        reset_token: issued.reset_token,
        expires_at: issued.expires_at,
    }))
}

/// POST /auth/reset-password
///
/// # Errors
/// - 400: Missing fields, password out of bounds, or unknown/expired token
pub async fn reset_password(
    body: web::Json<ResetPasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth.reset_password(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(message("Password has been reset")))
}

/// POST /auth/verify-email
pub async fn verify_email(
    body: web::Json<VerifyEmailRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth.verify_email(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(message("Email verified")))
}
