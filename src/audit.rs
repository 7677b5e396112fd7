/// Audit trail for account and moderation events
///
/// Entries are emitted through the tracing pipeline, so they land in the
/// same JSON log stream as request logs and can be filtered on
/// `target = "audit"`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => f.write_str("SUCCESS"),
            AuditOutcome::Failure => f.write_str("FAILURE"),
        }
    }
}

/// Audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    pub log_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// CREATE, UPDATE, SUBMIT, APPROVE, REJECT, DELETE, PROVISION ...
    pub action: &'static str,
    /// property, user, agent
    pub resource_type: &'static str,
    pub resource_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub outcome: AuditOutcome,
    pub message: String,
    pub previous_state: Option<String>,
    pub new_state: Option<String>,
}

impl AuditLog {
    pub fn new(action: &'static str, resource_type: &'static str, message: impl Into<String>) -> Self {
        Self {
            log_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            resource_type,
            resource_id: None,
            actor_id: None,
            outcome: AuditOutcome::Success,
            message: message.into(),
            previous_state: None,
            new_state: None,
        }
    }

    pub fn with_resource_id(mut self, id: Uuid) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_state_change(mut self, previous: impl fmt::Display, new: impl fmt::Display) -> Self {
        self.previous_state = Some(previous.to_string());
        self.new_state = Some(new.to_string());
        self
    }

    pub fn failed(mut self) -> Self {
        self.outcome = AuditOutcome::Failure;
        self
    }

    /// Emit the entry.
    pub fn record(&self) {
        match self.outcome {
            AuditOutcome::Failure => tracing::warn!(
                target: "audit",
                log_id = %self.log_id,
                action = self.action,
                resource_type = self.resource_type,
                resource_id = ?self.resource_id,
                actor_id = ?self.actor_id,
                outcome = %self.outcome,
                previous_state = ?self.previous_state,
                new_state = ?self.new_state,
                message = %self.message,
                "Audit log entry"
            ),
            AuditOutcome::Success => tracing::info!(
                target: "audit",
                log_id = %self.log_id,
                action = self.action,
                resource_type = self.resource_type,
                resource_id = ?self.resource_id,
                actor_id = ?self.actor_id,
                outcome = %self.outcome,
                previous_state = ?self.previous_state,
                new_state = ?self.new_state,
                message = %self.message,
                "Audit log entry"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_log_builder() {
        let property_id = Uuid::new_v4();
        let admin_id = Uuid::new_v4();
        let log = AuditLog::new("APPROVE", "property", "Listing approved")
            .with_resource_id(property_id)
            .with_actor(admin_id)
            .with_state_change("pending", "approved");

        assert_eq!(log.resource_id, Some(property_id));
        assert_eq!(log.actor_id, Some(admin_id));
        assert_eq!(log.previous_state.as_deref(), Some("pending"));
        assert_eq!(log.new_state.as_deref(), Some("approved"));
        assert_eq!(log.outcome, AuditOutcome::Success);
    }

    #[test]
    fn test_audit_log_serializes_outcome() {
        let log = AuditLog::new("DELETE", "property", "denied").failed();
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["outcome"], "FAILURE");
        assert_eq!(json["action"], "DELETE");
    }
}
