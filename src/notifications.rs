//! Notifications for users who favorited a listing.
//!
//! Delivery runs on a spawned task: the moderation request that triggered it
//! has already succeeded and never waits on, or fails because of, the
//! fan-out.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Notification, NotificationKind, Property};
use crate::email_client::EmailClient;
use crate::error::AppError;
use crate::store::{FavoriteStore, NotificationStore, UserStore};

#[derive(Clone)]
pub struct NotificationService {
    favorites: Arc<dyn FavoriteStore>,
    notifications: Arc<dyn NotificationStore>,
    users: Arc<dyn UserStore>,
    email_client: Option<EmailClient>,
}

impl NotificationService {
    pub fn new(
        favorites: Arc<dyn FavoriteStore>,
        notifications: Arc<dyn NotificationStore>,
        users: Arc<dyn UserStore>,
        email_client: Option<EmailClient>,
    ) -> Self {
        Self {
            favorites,
            notifications,
            users,
            email_client,
        }
    }

    /// Queue a notification about `property` for everyone who favorited it.
    pub fn dispatch(&self, property: &Property, kind: NotificationKind, message: String) {
        let service = self.clone();
        let property_id = property.id;

        tokio::spawn(async move {
            match service.fan_out(property_id, kind, &message).await {
                Ok(delivered) => tracing::info!(
                    property_id = %property_id,
                    kind = kind.as_str(),
                    delivered,
                    "Notifications delivered"
                ),
                Err(e) => tracing::error!(
                    property_id = %property_id,
                    kind = kind.as_str(),
                    error = %e,
                    "Notification fan-out failed"
                ),
            }
        });
    }

    async fn fan_out(
        &self,
        property_id: Uuid,
        kind: NotificationKind,
        message: &str,
    ) -> Result<usize, AppError> {
        let recipients = self.favorites.users_favoriting(property_id).await?;
        let mut delivered = 0;

        for user_id in recipients {
            let notification = Notification::new(user_id, property_id, kind, message.to_string());
            if let Err(e) = self.notifications.insert_notification(&notification).await {
                tracing::error!(user_id = %user_id, error = %e, "Failed to store notification");
                continue;
            }
            delivered += 1;
            self.email(user_id, message).await;
        }

        Ok(delivered)
    }

    async fn email(&self, user_id: Uuid, message: &str) {
        let Some(client) = &self.email_client else {
            return;
        };
        let recipient = match self.users.find_by_id(user_id).await {
            Ok(Some(user)) => user.email,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Recipient lookup failed");
                return;
            }
        };
        if let Err(e) = client
            .send_email(&recipient, "Update on a saved property", message)
            .await
        {
            tracing::warn!(user_id = %user_id, error = %e, "Notification email failed");
        }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Notification>, AppError> {
        self.notifications.list_notifications(user_id).await
    }

    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<(), AppError> {
        if self
            .notifications
            .mark_read(user_id, notification_id, Utc::now())
            .await?
        {
            Ok(())
        } else {
            Err(AppError::not_found("Notification not found"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AddressInput, PropertyInput};
    use crate::store::MemoryStore;

    fn property() -> Property {
        let input = PropertyInput {
            title: Some("Cabin".to_string()),
            price: Some(50.0),
            address: Some(AddressInput {
                line1: Some("Trail 3".to_string()),
                city: Some("Braga".to_string()),
                country: Some("PT".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        Property::from_input(Uuid::new_v4(), Uuid::new_v4(), input.validate().unwrap(), Utc::now())
    }

    #[tokio::test]
    async fn test_fan_out_reaches_only_favoriting_users() {
        let store = Arc::new(MemoryStore::new());
        let service = NotificationService::new(store.clone(), store.clone(), store.clone(), None);
        let listing = property();
        let fan = Uuid::new_v4();
        let bystander = Uuid::new_v4();
        store.add_favorite(fan, listing.id).await.unwrap();

        let delivered = service
            .fan_out(listing.id, NotificationKind::PriceChanged, "Price dropped")
            .await
            .unwrap();

        assert_eq!(delivered, 1);
        let inbox = service.list(fan).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::PriceChanged);
        assert!(service.list(bystander).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_is_scoped_to_owner() {
        let store = Arc::new(MemoryStore::new());
        let service = NotificationService::new(store.clone(), store.clone(), store.clone(), None);
        let listing = property();
        let fan = Uuid::new_v4();
        store.add_favorite(fan, listing.id).await.unwrap();
        service
            .fan_out(listing.id, NotificationKind::ListingApproved, "Approved")
            .await
            .unwrap();

        let id = service.list(fan).await.unwrap()[0].id;
        assert!(matches!(
            service.mark_read(Uuid::new_v4(), id).await,
            Err(AppError::NotFound(_))
        ));
        service.mark_read(fan, id).await.unwrap();
        assert!(service.list(fan).await.unwrap()[0].read_at.is_some());
    }
}
