/// Account lifecycle: registration, login, refresh rotation, logout,
/// password recovery, email verification and admin provisioning.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::audit::AuditLog;
use crate::auth::claims::Identity;
use crate::auth::jwt::generate_access_token;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens::{generate_opaque_token, generate_temp_password, hash_token, issue_token};
use crate::configuration::{AuthSettings, Environment, JwtSettings};
use crate::domain::{NewUser, PublicUser, RecoveryToken, Role, SessionRecord, User};
use crate::email_client::EmailClient;
use crate::error::{AppError, AuthError};
use crate::security::{RateLimitConfig, RateLimiter};
use crate::store::UserStore;
use crate::validators::{is_valid_email, is_valid_name, normalize_email, optional_name, required};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub struct Registration {
    pub user: PublicUser,
    /// Raw verify token, only outside production
    pub verify_token: Option<String>,
}

/// A signed-in session: the access token for the body and the refresh
/// token for the cookie.
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Cookie lifetime in seconds
    pub refresh_max_age: i64,
}

pub struct LoginOutcome {
    pub tokens: SessionTokens,
    pub user: PublicUser,
}

pub struct ResetIssued {
    pub reset_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct ProvisionedAgent {
    pub agent: PublicUser,
    pub temp_password: String,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt: JwtSettings,
    settings: AuthSettings,
    environment: Environment,
    email_client: Option<EmailClient>,
    forgot_limiter: RateLimiter,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        jwt: JwtSettings,
        settings: AuthSettings,
        environment: Environment,
        email_client: Option<EmailClient>,
    ) -> Self {
        let forgot_limiter = RateLimiter::new(RateLimitConfig::forgot_password(&settings));
        Self {
            users,
            jwt,
            settings,
            environment,
            email_client,
            forgot_limiter,
        }
    }

    /// Tokens are echoed in response bodies only outside production.
    fn exposes_tokens(&self) -> bool {
        !self.environment.is_production()
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<Registration, AppError> {
        let email = is_valid_email(required(&request.email, "email")?)?;
        let password = required(&request.password, "password")?;
        let first_name = optional_name(&request.first_name, "firstName")?;
        let last_name = optional_name(&request.last_name, "lastName")?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(password, self.settings.bcrypt_cost)?;
        let verify = issue_token(self.settings.verify_token_expiry);

        let user = self
            .users
            .insert_user(NewUser {
                email,
                password_hash,
                first_name,
                last_name,
                role: Role::User,
                verify_token: Some(RecoveryToken {
                    token_hash: verify.hash.clone(),
                    expires_at: verify.expires_at,
                }),
                must_change_password: false,
                created_by_admin: false,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");

        self.deliver(
            &user.email,
            "Verify your email",
            &format!("Use this code to verify your email address: {}", verify.raw),
        )
        .await;

        Ok(Registration {
            user: user.to_public(),
            verify_token: self.exposes_tokens().then_some(verify.raw),
        })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, AppError> {
        let email = normalize_email(required(&request.email, "email")?);
        let password = required(&request.password, "password")?;

        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                tracing::warn!("Login attempt for unknown account");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "Login attempt with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let lifetime = self.jwt.refresh_expiry(request.remember);
        let refresh = issue_token(lifetime);
        let session = SessionRecord {
            session_id: uuid::Uuid::new_v4(),
            token_hash: refresh.hash.clone(),
            expires_at: Some(refresh.expires_at),
        };

        // overwrites any earlier session: one active session per account
        self.users.set_session(user.id, session.clone()).await?;

        let access_token = self.access_token_for(&user, &session)?;

        tracing::info!(
            user_id = %user.id,
            session_id = %session.session_id,
            remember = request.remember,
            "User logged in"
        );

        Ok(LoginOutcome {
            tokens: SessionTokens {
                access_token,
                refresh_token: refresh.raw,
                refresh_max_age: lifetime,
            },
            user: user.to_public(),
        })
    }

    /// Rotate the refresh token presented in the cookie. The new token keeps
    /// the remaining lifetime of the old one.
    pub async fn refresh(&self, presented: Option<&str>) -> Result<SessionTokens, AppError> {
        let presented = presented.ok_or(AuthError::MissingToken)?;
        let presented_hash = hash_token(presented);

        let user = self
            .users
            .find_by_refresh_hash(&presented_hash)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        let current = user.session.clone().ok_or(AuthError::TokenInvalid)?;

        let now = Utc::now();
        let expires_at = match current.expires_at {
            Some(expires_at) if expires_at <= now => {
                tracing::info!(user_id = %user.id, "Refresh with expired session");
                return Err(AuthError::TokenExpired.into());
            }
            Some(expires_at) => expires_at,
            None => now + Duration::seconds(self.jwt.refresh_token_expiry),
        };

        let raw = generate_opaque_token();
        let rotated = SessionRecord {
            session_id: current.session_id,
            token_hash: hash_token(&raw),
            expires_at: Some(expires_at),
        };

        if !self
            .users
            .rotate_session(user.id, &presented_hash, rotated.clone())
            .await?
        {
            tracing::warn!(user_id = %user.id, "Refresh lost rotation race");
            return Err(AuthError::TokenInvalid.into());
        }

        let access_token = self.access_token_for(&user, &rotated)?;
        tracing::debug!(user_id = %user.id, "Refresh token rotated");

        Ok(SessionTokens {
            access_token,
            refresh_token: raw,
            refresh_max_age: (expires_at - now).num_seconds(),
        })
    }

    /// Revoke whichever session holds the presented token. Always succeeds.
    pub async fn logout(&self, presented: Option<&str>) -> Result<(), AppError> {
        if let Some(token) = presented {
            let cleared = self.users.clear_session_by_hash(&hash_token(token)).await?;
            tracing::info!(sessions_cleared = cleared, "Logout");
        }
        Ok(())
    }

    /// Issue a password-reset token when the account exists. The outcome
    /// looks the same either way.
    pub async fn forgot_password(
        &self,
        request: ForgotPasswordRequest,
    ) -> Result<ResetIssued, AppError> {
        let email = normalize_email(required(&request.email, "email")?);
        self.forgot_limiter.check(&email)?;

        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                tracing::info!("Password reset requested for unknown account");
                return Ok(ResetIssued {
                    reset_token: None,
                    expires_at: None,
                });
            }
        };

        let reset = issue_token(self.settings.reset_token_expiry);
        self.users
            .set_reset_token(
                user.id,
                RecoveryToken {
                    token_hash: reset.hash.clone(),
                    expires_at: reset.expires_at,
                },
            )
            .await?;

        tracing::info!(user_id = %user.id, "Password reset token issued");

        self.deliver(
            &user.email,
            "Reset your password",
            &format!(
                "Use this code to reset your password: {}\nIt expires at {}.",
                reset.raw,
                reset.expires_at.to_rfc3339()
            ),
        )
        .await;

        Ok(if self.exposes_tokens() {
            ResetIssued {
                reset_token: Some(reset.raw),
                expires_at: Some(reset.expires_at),
            }
        } else {
            ResetIssued {
                reset_token: None,
                expires_at: None,
            }
        })
    }

    /// Replace the password, clear the reset token and the password-change
    /// flag, and revoke the refresh session.
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), AppError> {
        let token = required(&request.token, "token")?;
        let new_password = required(&request.new_password, "newPassword")?;

        let user = self
            .users
            .find_by_reset_hash(&hash_token(token))
            .await?
            .ok_or(AuthError::InvalidRecoveryToken)?;
        let stored = user.reset_token.as_ref().ok_or(AuthError::InvalidRecoveryToken)?;
        if stored.is_expired(Utc::now()) {
            return Err(AuthError::InvalidRecoveryToken.into());
        }

        let password_hash = hash_password(new_password, self.settings.bcrypt_cost)?;
        self.users.complete_password_reset(user.id, &password_hash).await?;

        AuditLog::new("PASSWORD_RESET", "user", "Password reset, sessions revoked")
            .with_resource_id(user.id)
            .with_actor(user.id)
            .record();

        Ok(())
    }

    pub async fn verify_email(&self, request: VerifyEmailRequest) -> Result<(), AppError> {
        let token = required(&request.token, "token")?;

        let user = self
            .users
            .find_by_verify_hash(&hash_token(token))
            .await?
            .ok_or(AuthError::InvalidRecoveryToken)?;
        let stored = user.verify_token.as_ref().ok_or(AuthError::InvalidRecoveryToken)?;

        let now = Utc::now();
        if stored.is_expired(now) {
            return Err(AuthError::InvalidRecoveryToken.into());
        }

        self.users.mark_email_verified(user.id, now).await?;
        tracing::info!(user_id = %user.id, "Email verified");
        Ok(())
    }

    pub async fn get_profile(&self, identity: Option<&Identity>) -> Result<PublicUser, AppError> {
        let identity = identity.ok_or(AuthError::Unauthenticated)?;
        self.users
            .find_by_id(identity.id)
            .await?
            .map(|user| user.to_public())
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// Create an agent account with a one-time temporary password.
    pub async fn create_agent(
        &self,
        admin: &Identity,
        request: CreateAgentRequest,
    ) -> Result<ProvisionedAgent, AppError> {
        let email = is_valid_email(required(&request.email, "email")?)?;
        let first_name = is_valid_name(required(&request.first_name, "firstName")?, "firstName")?;
        let last_name = is_valid_name(required(&request.last_name, "lastName")?, "lastName")?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let temp_password = generate_temp_password(self.settings.temp_password_length);
        let password_hash = hash_password(&temp_password, self.settings.bcrypt_cost)?;

        let agent = self
            .users
            .insert_user(NewUser {
                email,
                password_hash,
                first_name: Some(first_name),
                last_name: Some(last_name),
                role: Role::Agent,
                verify_token: None,
                must_change_password: true,
                created_by_admin: true,
            })
            .await?;

        AuditLog::new("PROVISION", "agent", "Agent account created")
            .with_resource_id(agent.id)
            .with_actor(admin.id)
            .record();

        Ok(ProvisionedAgent {
            agent: agent.to_public(),
            temp_password,
        })
    }

    /// Seed the admin account if it does not exist yet.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<(), AppError> {
        let email = is_valid_email(email)?;

        if let Some(existing) = self.users.find_by_email(&email).await? {
            if existing.role != Role::Admin {
                tracing::warn!(
                    user_id = %existing.id,
                    "Bootstrap admin email belongs to a non-admin account, leaving it unchanged"
                );
            }
            return Ok(());
        }

        let password_hash = hash_password(password, self.settings.bcrypt_cost)?;
        let admin = self
            .users
            .insert_user(NewUser {
                email,
                password_hash,
                first_name: None,
                last_name: None,
                role: Role::Admin,
                verify_token: None,
                must_change_password: false,
                created_by_admin: false,
            })
            .await?;

        tracing::info!(user_id = %admin.id, "Bootstrap admin created");
        Ok(())
    }

    fn access_token_for(&self, user: &User, session: &SessionRecord) -> Result<String, AppError> {
        let identity = Identity {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            session_id: session.session_id,
        };
        generate_access_token(&identity, &self.jwt)
    }

    /// Email a recovery code in production. Failures are logged; the
    /// request itself still succeeds.
    async fn deliver(&self, recipient: &str, subject: &str, body: &str) {
        if self.exposes_tokens() {
            return;
        }
        let Some(client) = &self.email_client else {
            tracing::warn!("No email client configured, recovery email not sent");
            return;
        };
        if let Err(e) = client.send_email(recipient, subject, body).await {
            tracing::error!(error = %e, "Failed to send recovery email");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn jwt() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            issuer: "test".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            remember_refresh_token_expiry: 2592000,
        }
    }

    fn service(store: Arc<MemoryStore>) -> AuthService {
        let settings = AuthSettings {
            bcrypt_cost: 4,
            forgot_password_max_requests: 2,
            ..AuthSettings::default()
        };
        AuthService::new(store, jwt(), settings, Environment::Local, None)
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: Some(email.to_string()),
            password: Some("password123".to_string()),
            first_name: Some("Test".to_string()),
            last_name: None,
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            remember: false,
        }
    }

    #[tokio::test]
    async fn test_register_forces_user_role_and_normalises_email() {
        let auth = service(Arc::new(MemoryStore::new()));
        let registration = auth.register(register_request(" New@Example.com ")).await.unwrap();

        assert_eq!(registration.user.role, Role::User);
        assert_eq!(registration.user.email, "new@example.com");
        assert!(registration.verify_token.is_some());

        match auth.register(register_request("NEW@example.com")).await {
            Err(AppError::Conflict(_)) => (),
            other => panic!("expected Conflict, got {:?}", other.map(|r| r.user.id)),
        }
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let auth = service(Arc::new(MemoryStore::new()));
        auth.register(register_request("a@example.com")).await.unwrap();

        let unknown = auth.login(login_request("b@example.com", "password123")).await;
        let wrong = auth.login(login_request("a@example.com", "wrong-password")).await;

        assert!(matches!(unknown, Err(AppError::Auth(AuthError::InvalidCredentials))));
        assert!(matches!(wrong, Err(AppError::Auth(AuthError::InvalidCredentials))));
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_rejects_old_token() {
        let auth = service(Arc::new(MemoryStore::new()));
        auth.register(register_request("a@example.com")).await.unwrap();
        let login = auth.login(login_request("a@example.com", "password123")).await.unwrap();

        let first = login.tokens.refresh_token;
        let rotated = auth.refresh(Some(&first)).await.unwrap();
        assert_ne!(rotated.refresh_token, first);
        assert!(rotated.refresh_max_age <= 604800);

        assert!(matches!(
            auth.refresh(Some(&first)).await,
            Err(AppError::Auth(AuthError::TokenInvalid))
        ));
        assert!(auth.refresh(Some(&rotated.refresh_token)).await.is_ok());
        assert!(matches!(
            auth.refresh(None).await,
            Err(AppError::Auth(AuthError::MissingToken))
        ));
    }

    #[tokio::test]
    async fn test_refresh_rejects_expired_session() {
        let store = Arc::new(MemoryStore::new());
        let auth = service(store.clone());
        let registration = auth.register(register_request("a@example.com")).await.unwrap();

        store
            .set_session(
                registration.user.id,
                SessionRecord {
                    session_id: uuid::Uuid::new_v4(),
                    token_hash: hash_token("stale"),
                    expires_at: Some(Utc::now() - Duration::seconds(1)),
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            auth.refresh(Some("stale")).await,
            Err(AppError::Auth(AuthError::TokenExpired))
        ));
    }

    #[tokio::test]
    async fn test_reset_password_flow() {
        let auth = service(Arc::new(MemoryStore::new()));
        auth.register(register_request("a@example.com")).await.unwrap();
        let login = auth.login(login_request("a@example.com", "password123")).await.unwrap();

        let issued = auth
            .forgot_password(ForgotPasswordRequest {
                email: Some("A@example.com".to_string()),
            })
            .await
            .unwrap();
        let token = issued.reset_token.expect("token exposed outside production");

        auth.reset_password(ResetPasswordRequest {
            token: Some(token.clone()),
            new_password: Some("new-password".to_string()),
        })
        .await
        .unwrap();

        assert!(auth.refresh(Some(&login.tokens.refresh_token)).await.is_err());
        assert!(auth.login(login_request("a@example.com", "new-password")).await.is_ok());
        assert!(matches!(
            auth.reset_password(ResetPasswordRequest {
                token: Some(token),
                new_password: Some("another-password".to_string()),
            })
            .await,
            Err(AppError::Auth(AuthError::InvalidRecoveryToken))
        ));
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_and_throttle() {
        let auth = service(Arc::new(MemoryStore::new()));
        let request = || ForgotPasswordRequest {
            email: Some("ghost@example.com".to_string()),
        };

        let issued = auth.forgot_password(request()).await.unwrap();
        assert!(issued.reset_token.is_none());
        auth.forgot_password(request()).await.unwrap();

        assert!(matches!(
            auth.forgot_password(request()).await,
            Err(AppError::RateLimited(_))
        ));
    }

    #[tokio::test]
    async fn test_create_agent_sets_flags() {
        let auth = service(Arc::new(MemoryStore::new()));
        let admin = Identity {
            id: uuid::Uuid::new_v4(),
            email: "admin@example.com".to_string(),
            role: Role::Admin,
            session_id: uuid::Uuid::new_v4(),
        };

        let provisioned = auth
            .create_agent(
                &admin,
                CreateAgentRequest {
                    email: Some("agent@example.com".to_string()),
                    first_name: Some("Ana".to_string()),
                    last_name: Some("Silva".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(provisioned.agent.role, Role::Agent);
        assert!(provisioned.agent.must_change_password);
        assert!(provisioned.agent.created_by_admin);
        assert_eq!(provisioned.temp_password.len(), 12);

        let login = auth
            .login(login_request("agent@example.com", &provisioned.temp_password))
            .await
            .unwrap();
        assert!(login.user.must_change_password);
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let auth = service(Arc::new(MemoryStore::new()));
        auth.ensure_admin("root@example.com", "admin-password").await.unwrap();
        auth.ensure_admin("root@example.com", "admin-password").await.unwrap();

        let login = auth
            .login(login_request("root@example.com", "admin-password"))
            .await
            .unwrap();
        assert_eq!(login.user.role, Role::Admin);
    }
}
