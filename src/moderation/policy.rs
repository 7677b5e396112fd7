//! Who may do what to a listing.
//!
//! Every moderation endpoint asks `can_transition` before touching a
//! listing, so the authorization rules live here and nowhere else.

use crate::auth::Identity;
use crate::domain::{ListingStatus, Property};
use crate::error::{AppError, AuthError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Edit,
    Delete,
    Submit,
    Approve,
    Reject,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "VIEW",
            Action::Edit => "UPDATE",
            Action::Delete => "DELETE",
            Action::Submit => "SUBMIT",
            Action::Approve => "APPROVE",
            Action::Reject => "REJECT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No identity attached
    Unauthenticated,
    /// Authenticated, but neither owner nor admin as required
    NotPermitted,
    /// The listing is not visible to the caller; reported as absent
    Hidden,
    /// Allowed caller, but the listing is in the wrong state
    InvalidState(&'static str),
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => AppError::Auth(AuthError::Unauthenticated),
            Denial::NotPermitted => {
                AppError::Forbidden("Not allowed to modify this property".to_string())
            }
            Denial::Hidden => AppError::not_found("Property not found"),
            Denial::InvalidState(msg) => AppError::Conflict(msg.to_string()),
        }
    }
}

/// Decide whether `actor` may perform `action` on `listing` in its current
/// state.
pub fn can_transition(
    actor: Option<&Identity>,
    listing: &Property,
    action: Action,
) -> Result<(), Denial> {
    let is_owner = actor.map_or(false, |a| listing.is_owned_by(a.id));
    let is_admin = actor.map_or(false, Identity::is_admin);

    match action {
        Action::View => {
            if listing.status == ListingStatus::Approved || is_owner || is_admin {
                Ok(())
            } else {
                Err(Denial::Hidden)
            }
        }
        Action::Edit | Action::Delete => {
            actor.ok_or(Denial::Unauthenticated)?;
            if is_owner || is_admin {
                Ok(())
            } else {
                Err(Denial::NotPermitted)
            }
        }
        Action::Submit => {
            actor.ok_or(Denial::Unauthenticated)?;
            if !is_owner {
                return Err(Denial::NotPermitted);
            }
            if listing.status == ListingStatus::Approved {
                return Err(Denial::InvalidState("Property is already approved"));
            }
            Ok(())
        }
        Action::Approve | Action::Reject => {
            actor.ok_or(Denial::Unauthenticated)?;
            if !is_admin {
                return Err(Denial::NotPermitted);
            }
            if listing.status != ListingStatus::Pending {
                return Err(Denial::InvalidState("Only pending properties can be moderated"));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AddressInput, PropertyInput, Role};
    use chrono::Utc;
    use uuid::Uuid;

    fn actor(role: Role) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "actor@example.com".to_string(),
            role,
            session_id: Uuid::new_v4(),
        }
    }

    fn listing(owner: &Identity, status: ListingStatus) -> Property {
        let input = PropertyInput {
            title: Some("Flat".to_string()),
            price: Some(1000.0),
            address: Some(AddressInput {
                line1: Some("1 Road".to_string()),
                city: Some("Porto".to_string()),
                country: Some("PT".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut property =
            Property::from_input(Uuid::new_v4(), owner.id, input.validate().unwrap(), Utc::now());
        property.status = status;
        property
    }

    #[test]
    fn test_view_hides_unapproved_from_strangers() {
        let owner = actor(Role::Agent);
        let stranger = actor(Role::Agent);
        let admin = actor(Role::Admin);

        for status in [ListingStatus::Draft, ListingStatus::Pending, ListingStatus::Rejected] {
            let p = listing(&owner, status);
            assert_eq!(can_transition(None, &p, Action::View), Err(Denial::Hidden));
            assert_eq!(can_transition(Some(&stranger), &p, Action::View), Err(Denial::Hidden));
            assert!(can_transition(Some(&owner), &p, Action::View).is_ok());
            assert!(can_transition(Some(&admin), &p, Action::View).is_ok());
        }

        let approved = listing(&owner, ListingStatus::Approved);
        assert!(can_transition(None, &approved, Action::View).is_ok());
    }

    #[test]
    fn test_edit_and_delete_need_owner_or_admin() {
        let owner = actor(Role::Agent);
        let p = listing(&owner, ListingStatus::Approved);

        for action in [Action::Edit, Action::Delete] {
            assert!(can_transition(Some(&owner), &p, action).is_ok());
            assert!(can_transition(Some(&actor(Role::Admin)), &p, action).is_ok());
            assert_eq!(
                can_transition(Some(&actor(Role::Agent)), &p, action),
                Err(Denial::NotPermitted)
            );
            assert_eq!(
                can_transition(Some(&actor(Role::User)), &p, action),
                Err(Denial::NotPermitted)
            );
            assert_eq!(can_transition(None, &p, action), Err(Denial::Unauthenticated));
        }
    }

    #[test]
    fn test_submit_is_owner_only_and_not_from_approved() {
        let owner = actor(Role::Agent);

        let rejected = listing(&owner, ListingStatus::Rejected);
        assert!(can_transition(Some(&owner), &rejected, Action::Submit).is_ok());
        assert_eq!(
            can_transition(Some(&actor(Role::Admin)), &rejected, Action::Submit),
            Err(Denial::NotPermitted)
        );

        let approved = listing(&owner, ListingStatus::Approved);
        assert!(matches!(
            can_transition(Some(&owner), &approved, Action::Submit),
            Err(Denial::InvalidState(_))
        ));
    }

    #[test]
    fn test_moderation_is_admin_only_from_pending() {
        let owner = actor(Role::Agent);
        let admin = actor(Role::Admin);
        let pending = listing(&owner, ListingStatus::Pending);

        for action in [Action::Approve, Action::Reject] {
            assert!(can_transition(Some(&admin), &pending, action).is_ok());
            assert_eq!(
                can_transition(Some(&owner), &pending, action),
                Err(Denial::NotPermitted)
            );
        }

        let approved = listing(&owner, ListingStatus::Approved);
        assert!(matches!(
            can_transition(Some(&admin), &approved, Action::Approve),
            Err(Denial::InvalidState(_))
        ));
    }

    #[test]
    fn test_denials_map_to_statuses() {
        use actix_web::ResponseError;

        let status = |d: Denial| AppError::from(d).status_code().as_u16();
        assert_eq!(status(Denial::Unauthenticated), 401);
        assert_eq!(status(Denial::NotPermitted), 403);
        assert_eq!(status(Denial::Hidden), 404);
        assert_eq!(status(Denial::InvalidState("x")), 409);
    }
}
