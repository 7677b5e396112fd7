//! Listing state transitions.
//!
//! Pure functions over `Property`; authorization has already been decided
//! by the policy before any of these run.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::Identity;
use crate::domain::{FieldChanges, ListingStatus, Property, PropertyPatch, ValidListing};
use crate::error::ValidationError;

/// New listings always start in `pending`, owned by the creator.
pub fn create(agent_id: Uuid, input: ValidListing, now: DateTime<Utc>) -> Property {
    let mut property = Property::from_input(Uuid::new_v4(), agent_id, input, now);
    enter_pending(&mut property);
    property
}

/// Back to `pending` with all audit fields cleared.
fn enter_pending(property: &mut Property) {
    property.status = ListingStatus::Pending;
    property.approved_by = None;
    property.approved_at = None;
    property.rejection_reason = None;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditOutcome {
    pub changes: FieldChanges,
    pub previous_status: ListingStatus,
}

/// Apply a patch. Edits by anyone other than an admin send the listing back
/// to moderation.
pub fn edit(
    property: &mut Property,
    editor: &Identity,
    patch: &PropertyPatch,
    now: DateTime<Utc>,
) -> Result<EditOutcome, ValidationError> {
    if patch.is_empty() {
        return Err(ValidationError::MissingField("at least one field".to_string()));
    }

    let previous_status = property.status;
    let changes = patch.apply_to(property)?;
    if !editor.is_admin() {
        enter_pending(property);
    }
    property.updated_at = now;

    Ok(EditOutcome {
        changes,
        previous_status,
    })
}

pub fn submit(property: &mut Property, now: DateTime<Utc>) {
    enter_pending(property);
    property.updated_at = now;
}

pub fn approve(property: &mut Property, admin_id: Uuid, now: DateTime<Utc>) {
    property.status = ListingStatus::Approved;
    property.approved_by = Some(admin_id);
    property.approved_at = Some(now);
    property.rejection_reason = None;
    property.updated_at = now;
}

pub fn reject(property: &mut Property, reason: String, now: DateTime<Utc>) {
    property.status = ListingStatus::Rejected;
    property.rejection_reason = Some(reason);
    property.approved_by = None;
    property.approved_at = None;
    property.updated_at = now;
}
