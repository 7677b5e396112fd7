use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ListingApproved,
    ListingRejected,
    PriceChanged,
    StatusChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ListingApproved => "listing_approved",
            NotificationKind::ListingRejected => "listing_rejected",
            NotificationKind::PriceChanged => "price_changed",
            NotificationKind::StatusChanged => "status_changed",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "listing_approved" => Ok(NotificationKind::ListingApproved),
            "listing_rejected" => Ok(NotificationKind::ListingRejected),
            "price_changed" => Ok(NotificationKind::PriceChanged),
            "status_changed" => Ok(NotificationKind::StatusChanged),
            other => Err(format!("unknown notification kind '{}'", other)),
        }
    }
}

/// Message delivered to a user who favorited a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub property_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: Uuid, property_id: Uuid, kind: NotificationKind, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            property_id,
            kind,
            message,
            read_at: None,
            created_at: Utc::now(),
        }
    }
}
