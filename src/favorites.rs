use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Identity;
use crate::domain::Property;
use crate::error::AppError;
use crate::moderation::{can_transition, Action};
use crate::store::{FavoriteStore, PropertyStore};

/// Per-user saved listings. Only listings the caller may view can be saved
/// or are returned.
pub struct FavoriteService {
    favorites: Arc<dyn FavoriteStore>,
    properties: Arc<dyn PropertyStore>,
}

impl FavoriteService {
    pub fn new(favorites: Arc<dyn FavoriteStore>, properties: Arc<dyn PropertyStore>) -> Self {
        Self {
            favorites,
            properties,
        }
    }

    pub async fn add(&self, actor: &Identity, property_id: Uuid) -> Result<(), AppError> {
        let property = self
            .properties
            .find_property(property_id)
            .await?
            .ok_or_else(|| AppError::not_found("Property not found"))?;
        can_transition(Some(actor), &property, Action::View)?;

        self.favorites.add_favorite(actor.id, property_id).await?;
        tracing::debug!(user_id = %actor.id, property_id = %property_id, "Favorite added");
        Ok(())
    }

    /// Idempotent
    pub async fn remove(&self, actor: &Identity, property_id: Uuid) -> Result<(), AppError> {
        let removed = self.favorites.remove_favorite(actor.id, property_id).await?;
        tracing::debug!(user_id = %actor.id, property_id = %property_id, removed, "Favorite removed");
        Ok(())
    }

    pub async fn list(&self, actor: &Identity) -> Result<Vec<Property>, AppError> {
        let mut saved = Vec::new();
        for property_id in self.favorites.list_favorites(actor.id).await? {
            if let Some(property) = self.properties.find_property(property_id).await? {
                if can_transition(Some(actor), &property, Action::View).is_ok() {
                    saved.push(property);
                }
            }
        }
        Ok(saved)
    }
}
