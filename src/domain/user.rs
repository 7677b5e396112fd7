use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account role. Only the admin-driven paths produce `Agent` or `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "agent" => Ok(Role::Agent),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The account's current refresh session. One per account: a new login
/// replaces it, which signs out any other device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub token_hash: String,
    /// `None` means the session never expires on its own; refresh then falls
    /// back to the default window.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Hashed single-use token for password reset or email verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryToken {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl RecoveryToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Stored account, including secret material. Never serialised directly.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub session: Option<SessionRecord>,
    pub reset_token: Option<RecoveryToken>,
    pub verify_token: Option<RecoveryToken>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub must_change_password: bool,
    pub created_by_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
            email_verified: self.email_verified_at.is_some(),
            email_verified_at: self.email_verified_at,
            must_change_password: self.must_change_password,
            created_by_admin: self.created_by_admin,
            created_at: self.created_at,
        }
    }
}

/// Fields needed to create an account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub verify_token: Option<RecoveryToken>,
    pub must_change_password: bool,
    pub created_by_admin: bool,
}

impl NewUser {
    pub fn into_user(self, id: Uuid, now: DateTime<Utc>) -> User {
        User {
            id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            role: self.role,
            session: None,
            reset_token: None,
            verify_token: self.verify_token,
            email_verified_at: None,
            must_change_password: self.must_change_password,
            created_by_admin: self.created_by_admin,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Profile fields safe to hand to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub must_change_password: bool,
    pub created_by_admin: bool,
    pub created_at: DateTime<Utc>,
}
