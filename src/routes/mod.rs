mod admin;
mod auth;
mod favorites;
mod health_check;
mod notifications;
mod properties;

pub use admin::{approve_property, create_agent, moderation_queue, reject_property};
pub use auth::{
    forgot_password, get_profile, login, logout, refresh, register, reset_password, verify_email,
};
pub use favorites::{add_favorite, list_favorites, remove_favorite};
pub use health_check::health_check;
pub use notifications::{list_notifications, mark_notification_read};
pub use properties::{
    create_property, delete_property, get_property, list_my_properties, list_properties,
    submit_property, update_property,
};
