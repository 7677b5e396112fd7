//! Storage traits for testability and dependency injection.
//!
//! Services only talk to these traits. `PgStore` backs production;
//! `MemoryStore` backs the integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ListingStatus, NewUser, Notification, Property, PropertyFilter, RecoveryToken, SessionRecord,
    User,
};
use crate::error::AppError;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, AppError>;

/// Account and credential persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new account. Fails with `Conflict` when the email exists.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Lookup by normalised (lowercase) email
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_by_refresh_hash(&self, token_hash: &str) -> StoreResult<Option<User>>;

    async fn find_by_reset_hash(&self, token_hash: &str) -> StoreResult<Option<User>>;

    async fn find_by_verify_hash(&self, token_hash: &str) -> StoreResult<Option<User>>;

    /// Replace the account's refresh session unconditionally (login).
    async fn set_session(&self, user_id: Uuid, session: SessionRecord) -> StoreResult<()>;

    /// Replace the refresh session only if the stored hash still equals
    /// `expected_hash`. Returns `false` when another rotation won the race.
    async fn rotate_session(
        &self,
        user_id: Uuid,
        expected_hash: &str,
        session: SessionRecord,
    ) -> StoreResult<bool>;

    /// Clear the refresh session of every account holding this hash.
    /// Returns the number of accounts touched.
    async fn clear_session_by_hash(&self, token_hash: &str) -> StoreResult<u64>;

    async fn set_reset_token(&self, user_id: Uuid, token: RecoveryToken) -> StoreResult<()>;

    /// Replace the password hash, clear the reset token, clear
    /// `must_change_password` and revoke the refresh session.
    async fn complete_password_reset(&self, user_id: Uuid, password_hash: &str)
        -> StoreResult<()>;

    /// Set the verified timestamp and clear the verify token.
    async fn mark_email_verified(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
}

/// Listing persistence
#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn insert_property(&self, property: &Property) -> StoreResult<()>;

    async fn find_property(&self, id: Uuid) -> StoreResult<Option<Property>>;

    /// One page of listings in `status` matching the filter (structured
    /// fields and text query), newest first.
    async fn list_by_status(
        &self,
        status: ListingStatus,
        filter: &PropertyFilter,
    ) -> StoreResult<Vec<Property>>;

    /// All listings owned by `agent_id`, newest first.
    async fn list_by_agent(&self, agent_id: Uuid) -> StoreResult<Vec<Property>>;

    /// Overwrite the stored listing (last write wins).
    async fn save_property(&self, property: &Property) -> StoreResult<()>;

    /// Remove the listing and every favorite pointing at it.
    async fn delete_property(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait FavoriteStore: Send + Sync {
    /// Idempotent
    async fn add_favorite(&self, user_id: Uuid, property_id: Uuid) -> StoreResult<()>;

    async fn remove_favorite(&self, user_id: Uuid, property_id: Uuid) -> StoreResult<bool>;

    async fn list_favorites(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>>;

    async fn users_favoriting(&self, property_id: Uuid) -> StoreResult<Vec<Uuid>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()>;

    /// Newest first
    async fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>>;

    async fn mark_read(&self, user_id: Uuid, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;
}
