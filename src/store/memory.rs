use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{FavoriteStore, NotificationStore, PropertyStore, StoreResult, UserStore};
use crate::domain::{
    ListingStatus, NewUser, Notification, Property, PropertyFilter, RecoveryToken, SessionRecord,
    User,
};
use crate::error::AppError;

/// In-process store with the same semantics as `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    properties: HashMap<Uuid, Property>,
    /// (user_id, property_id)
    favorites: BTreeSet<(Uuid, Uuid)>,
    notifications: Vec<Notification>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut properties: Vec<Property>) -> Vec<Property> {
    properties.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    properties
}

impl Inner {
    fn user_mut(&mut self, user_id: Uuid) -> StoreResult<&mut User> {
        self.users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found("user"))
    }

    fn find_user(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        self.users.values().find(|u| pred(u)).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let user = user.into_user(Uuid::new_v4(), Utc::now());
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.find_user(|u| u.email == email))
    }

    async fn find_by_refresh_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.find_user(|u| {
            u.session
                .as_ref()
                .map_or(false, |s| s.token_hash == token_hash)
        }))
    }

    async fn find_by_reset_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.find_user(|u| {
            u.reset_token
                .as_ref()
                .map_or(false, |t| t.token_hash == token_hash)
        }))
    }

    async fn find_by_verify_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.find_user(|u| {
            u.verify_token
                .as_ref()
                .map_or(false, |t| t.token_hash == token_hash)
        }))
    }

    async fn set_session(&self, user_id: Uuid, session: SessionRecord) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let user = inner.user_mut(user_id)?;
        user.session = Some(session);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn rotate_session(
        &self,
        user_id: Uuid,
        expected_hash: &str,
        session: SessionRecord,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let user = inner.user_mut(user_id)?;
        let current = user.session.as_ref().map(|s| s.token_hash.as_str());
        if current != Some(expected_hash) {
            return Ok(false);
        }
        user.session = Some(session);
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn clear_session_by_hash(&self, token_hash: &str) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let mut cleared = 0;
        for user in inner.users.values_mut() {
            if user
                .session
                .as_ref()
                .map_or(false, |s| s.token_hash == token_hash)
            {
                user.session = None;
                user.updated_at = Utc::now();
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn set_reset_token(&self, user_id: Uuid, token: RecoveryToken) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let user = inner.user_mut(user_id)?;
        user.reset_token = Some(token);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn complete_password_reset(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let user = inner.user_mut(user_id)?;
        user.password_hash = password_hash.to_string();
        user.reset_token = None;
        user.must_change_password = false;
        user.session = None;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let user = inner.user_mut(user_id)?;
        user.email_verified_at = Some(at);
        user.verify_token = None;
        user.updated_at = at;
        Ok(())
    }
}

#[async_trait]
impl PropertyStore for MemoryStore {
    async fn insert_property(&self, property: &Property) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.properties.contains_key(&property.id) {
            return Err(AppError::Conflict("Property already exists".to_string()));
        }
        inner.properties.insert(property.id, property.clone());
        Ok(())
    }

    async fn find_property(&self, id: Uuid) -> StoreResult<Option<Property>> {
        Ok(self.inner.read().await.properties.get(&id).cloned())
    }

    async fn list_by_status(
        &self,
        status: ListingStatus,
        filter: &PropertyFilter,
    ) -> StoreResult<Vec<Property>> {
        let inner = self.inner.read().await;
        let matching = inner
            .properties
            .values()
            .filter(|p| p.status == status && filter.matches_fields(p))
            .cloned()
            .collect();
        Ok(filter.paginate(newest_first(matching)))
    }

    async fn list_by_agent(&self, agent_id: Uuid) -> StoreResult<Vec<Property>> {
        let inner = self.inner.read().await;
        let owned = inner
            .properties
            .values()
            .filter(|p| p.agent_id == agent_id)
            .cloned()
            .collect();
        Ok(newest_first(owned))
    }

    async fn save_property(&self, property: &Property) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        match inner.properties.get_mut(&property.id) {
            Some(stored) => {
                *stored = property.clone();
                Ok(())
            }
            None => Err(AppError::not_found("property")),
        }
    }

    async fn delete_property(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let removed = inner.properties.remove(&id).is_some();
        inner.favorites.retain(|(_, property_id)| *property_id != id);
        Ok(removed)
    }
}

#[async_trait]
impl FavoriteStore for MemoryStore {
    async fn add_favorite(&self, user_id: Uuid, property_id: Uuid) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .favorites
            .insert((user_id, property_id));
        Ok(())
    }

    async fn remove_favorite(&self, user_id: Uuid, property_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .inner
            .write()
            .await
            .favorites
            .remove(&(user_id, property_id)))
    }

    async fn list_favorites(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(self
            .inner
            .read()
            .await
            .favorites
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, p)| *p)
            .collect())
    }

    async fn users_favoriting(&self, property_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(self
            .inner
            .read()
            .await
            .favorites
            .iter()
            .filter(|(_, p)| *p == property_id)
            .map(|(u, _)| *u)
            .collect())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .notifications
            .push(notification.clone());
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let inner = self.inner.read().await;
        let mut mine: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }

    async fn mark_read(&self, user_id: Uuid, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
        {
            Some(notification) => {
                notification.read_at.get_or_insert(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: None,
            last_name: None,
            role: Role::User,
            verify_token: None,
            must_change_password: false,
            created_by_admin: false,
        }
    }

    fn session(hash: &str) -> SessionRecord {
        SessionRecord {
            session_id: Uuid::new_v4(),
            token_hash: hash.to_string(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store.insert_user(new_user("a@example.com")).await.unwrap();

        match store.insert_user(new_user("a@example.com")).await {
            Err(AppError::Conflict(_)) => (),
            other => panic!("expected conflict, got {:?}", other.map(|u| u.id)),
        }
    }

    #[tokio::test]
    async fn test_rotate_session_compares_hash() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("a@example.com")).await.unwrap();
        store.set_session(user.id, session("first")).await.unwrap();

        assert!(store.rotate_session(user.id, "first", session("second")).await.unwrap());
        assert!(!store.rotate_session(user.id, "first", session("third")).await.unwrap());
        assert!(store.find_by_refresh_hash("first").await.unwrap().is_none());
        assert!(store.find_by_refresh_hash("second").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_password_reset_revokes_session() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("a@example.com")).await.unwrap();
        store.set_session(user.id, session("live")).await.unwrap();

        store.complete_password_reset(user.id, "new-hash").await.unwrap();

        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(user.session.is_none());
        assert_eq!(user.password_hash, "new-hash");
        assert_eq!(store.clear_session_by_hash("live").await.unwrap(), 0);
    }
}
