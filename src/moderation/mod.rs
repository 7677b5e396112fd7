//! Property listings and their moderation lifecycle.
//!
//! ```text
//! create                      -> pending
//! owner edit, submit          -> pending   (audit fields cleared)
//! admin edit                  -> unchanged
//! approve (from pending)      -> approved  (approvedBy, approvedAt)
//! reject  (from pending)      -> rejected  (rejectionReason)
//! ```

pub mod engine;
pub mod policy;
mod service;

pub use policy::{can_transition, Action, Denial};
pub use service::{ListingService, PropertyPage};
