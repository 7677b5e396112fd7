use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::engine;
use super::policy::{can_transition, Action};
use crate::audit::AuditLog;
use crate::auth::Identity;
use crate::domain::{
    ListingStatus, NotificationKind, Property, PropertyFilter, PropertyInput, PropertyPatch, Role,
};
use crate::error::AppError;
use crate::middleware::{require_password_change_cleared, require_role};
use crate::notifications::NotificationService;
use crate::store::{PropertyStore, UserStore};
use crate::validators::is_valid_reason;

const LISTING_ROLES: &[Role] = &[Role::Agent, Role::Admin];

#[derive(Debug, Serialize)]
pub struct PropertyPage {
    pub properties: Vec<Property>,
    pub page: usize,
    pub limit: usize,
}

/// Listing CRUD and moderation transitions
pub struct ListingService {
    properties: Arc<dyn PropertyStore>,
    users: Arc<dyn UserStore>,
    notifier: NotificationService,
}

impl ListingService {
    pub fn new(
        properties: Arc<dyn PropertyStore>,
        users: Arc<dyn UserStore>,
        notifier: NotificationService,
    ) -> Self {
        Self {
            properties,
            users,
            notifier,
        }
    }

    async fn load(&self, id: Uuid) -> Result<Property, AppError> {
        self.properties
            .find_property(id)
            .await?
            .ok_or_else(|| AppError::not_found("Property not found"))
    }

    /// Policy check with a failure entry in the audit trail.
    fn authorize(
        &self,
        actor: Option<&Identity>,
        property: &Property,
        action: Action,
    ) -> Result<(), AppError> {
        can_transition(actor, property, action).map_err(|denial| {
            if action != Action::View {
                let mut log = AuditLog::new(action.as_str(), "property", format!("{:?}", denial))
                    .with_resource_id(property.id)
                    .failed();
                if let Some(actor) = actor {
                    log = log.with_actor(actor.id);
                }
                log.record();
            }
            AppError::from(denial)
        })
    }

    pub async fn create(
        &self,
        actor: &Identity,
        input: PropertyInput,
    ) -> Result<Property, AppError> {
        require_role(Some(actor), LISTING_ROLES)?;
        require_password_change_cleared(actor, self.users.as_ref()).await?;

        let listing = input.validate()?;
        let property = engine::create(actor.id, listing, Utc::now());
        self.properties.insert_property(&property).await?;

        AuditLog::new("CREATE", "property", "Listing created")
            .with_resource_id(property.id)
            .with_actor(actor.id)
            .with_state_change("none", property.status)
            .record();

        Ok(property)
    }

    /// Approved listings matching the filter, one page at a time.
    pub async fn list_public(&self, filter: &PropertyFilter) -> Result<PropertyPage, AppError> {
        let properties = self
            .properties
            .list_by_status(ListingStatus::Approved, filter)
            .await?;

        Ok(PropertyPage {
            properties,
            page: filter.page.unwrap_or(1).max(1),
            limit: filter.limit(),
        })
    }

    /// Moderation queue; `pending` unless another status is requested.
    pub async fn list_for_moderation(
        &self,
        actor: &Identity,
        filter: &PropertyFilter,
    ) -> Result<PropertyPage, AppError> {
        require_role(Some(actor), &[Role::Admin])?;

        let status = filter.status.unwrap_or(ListingStatus::Pending);
        let properties = self.properties.list_by_status(status, filter).await?;

        Ok(PropertyPage {
            properties,
            page: filter.page.unwrap_or(1).max(1),
            limit: filter.limit(),
        })
    }

    /// Every listing the caller owns, in any state.
    pub async fn list_mine(&self, actor: &Identity) -> Result<Vec<Property>, AppError> {
        require_role(Some(actor), LISTING_ROLES)?;
        require_password_change_cleared(actor, self.users.as_ref()).await?;

        self.properties.list_by_agent(actor.id).await
    }

    pub async fn get(&self, actor: Option<&Identity>, id: Uuid) -> Result<Property, AppError> {
        let property = self.load(id).await?;
        self.authorize(actor, &property, Action::View)?;
        Ok(property)
    }

    pub async fn update(
        &self,
        actor: &Identity,
        id: Uuid,
        patch: PropertyPatch,
    ) -> Result<Property, AppError> {
        let mut property = self.load(id).await?;
        self.authorize(Some(actor), &property, Action::Edit)?;
        require_password_change_cleared(actor, self.users.as_ref()).await?;

        let outcome = engine::edit(&mut property, actor, &patch, Utc::now())?;
        self.properties.save_property(&property).await?;

        AuditLog::new("UPDATE", "property", "Listing updated")
            .with_resource_id(property.id)
            .with_actor(actor.id)
            .with_state_change(outcome.previous_status, property.status)
            .record();

        if let Some((old, new)) = outcome.changes.price {
            self.notifier.dispatch(
                &property,
                NotificationKind::PriceChanged,
                format!(
                    "The price of \"{}\" changed from {:.2} to {:.2} {}",
                    property.title, old, new, property.currency
                ),
            );
        } else if outcome.previous_status != property.status {
            self.notify_status(&property);
        }

        Ok(property)
    }

    pub async fn delete(&self, actor: &Identity, id: Uuid) -> Result<(), AppError> {
        let property = self.load(id).await?;
        self.authorize(Some(actor), &property, Action::Delete)?;
        require_password_change_cleared(actor, self.users.as_ref()).await?;

        if !self.properties.delete_property(id).await? {
            return Err(AppError::not_found("Property not found"));
        }

        AuditLog::new("DELETE", "property", "Listing deleted")
            .with_resource_id(id)
            .with_actor(actor.id)
            .with_state_change(property.status, "deleted")
            .record();

        Ok(())
    }

    pub async fn submit(&self, actor: &Identity, id: Uuid) -> Result<Property, AppError> {
        let mut property = self.load(id).await?;
        self.authorize(Some(actor), &property, Action::Submit)?;
        require_password_change_cleared(actor, self.users.as_ref()).await?;

        let previous = property.status;
        engine::submit(&mut property, Utc::now());
        self.properties.save_property(&property).await?;

        AuditLog::new("SUBMIT", "property", "Listing submitted for approval")
            .with_resource_id(property.id)
            .with_actor(actor.id)
            .with_state_change(previous, property.status)
            .record();

        if previous != property.status {
            self.notify_status(&property);
        }

        Ok(property)
    }

    pub async fn approve(&self, actor: &Identity, id: Uuid) -> Result<Property, AppError> {
        let mut property = self.load(id).await?;
        self.authorize(Some(actor), &property, Action::Approve)?;

        let previous = property.status;
        engine::approve(&mut property, actor.id, Utc::now());
        self.properties.save_property(&property).await?;

        AuditLog::new("APPROVE", "property", "Listing approved")
            .with_resource_id(property.id)
            .with_actor(actor.id)
            .with_state_change(previous, property.status)
            .record();

        self.notifier.dispatch(
            &property,
            NotificationKind::ListingApproved,
            format!("\"{}\" is now live", property.title),
        );

        Ok(property)
    }

    /// The reason is validated before the listing is even loaded, so a
    /// missing reason is always a 400.
    pub async fn reject(
        &self,
        actor: &Identity,
        id: Uuid,
        reason: &Option<String>,
    ) -> Result<Property, AppError> {
        let reason = is_valid_reason(reason)?;

        let mut property = self.load(id).await?;
        self.authorize(Some(actor), &property, Action::Reject)?;

        let previous = property.status;
        engine::reject(&mut property, reason, Utc::now());
        self.properties.save_property(&property).await?;

        AuditLog::new("REJECT", "property", "Listing rejected")
            .with_resource_id(property.id)
            .with_actor(actor.id)
            .with_state_change(previous, property.status)
            .record();

        self.notifier.dispatch(
            &property,
            NotificationKind::ListingRejected,
            format!(
                "\"{}\" was not approved: {}",
                property.title,
                property.rejection_reason.as_deref().unwrap_or_default()
            ),
        );

        Ok(property)
    }

    fn notify_status(&self, property: &Property) {
        self.notifier.dispatch(
            property,
            NotificationKind::StatusChanged,
            format!("\"{}\" is now {}", property.title, property.status),
        );
    }
}
