/// Domain records shared by the stores, services and routes.

mod notification;
mod property;
mod user;

pub use notification::{Notification, NotificationKind};
pub use property::{
    Address, AddressInput, FieldChanges, ListingStatus, ListingType, Property, PropertyFilter,
    PropertyInput, PropertyPatch, ValidListing,
};
pub use user::{NewUser, PublicUser, RecoveryToken, Role, SessionRecord, User};
