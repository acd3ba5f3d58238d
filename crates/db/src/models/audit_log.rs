use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub tenant_id: ObjectId,
    pub actor_user_id: Option<String>,
    #[serde(default)]
    pub actor_type: ActorType,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<ObjectId>,
    #[serde(default)]
    pub details: serde_json::Value,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    #[default]
    User,
    System,
}

/// Action names written to the audit trail.
pub mod actions {
    pub const TENANT_CREATED: &str = "tenant_created";
    pub const TENANT_UPDATED: &str = "tenant_updated";
    pub const INVITATION_CREATED: &str = "invitation_created";
    pub const INVITATION_ACCEPTED: &str = "invitation_accepted";
    pub const INVITATION_REVOKED: &str = "invitation_revoked";
    pub const INVITATION_SUPERSEDED: &str = "invitation_superseded";
    pub const MEMBER_REMOVED: &str = "member_removed";
    pub const MODULES_CHANGED: &str = "modules_changed";
}

impl AuditLog {
    pub const COLLECTION: &'static str = "audit_logs";

    pub fn new(
        tenant_id: ObjectId,
        actor_user_id: Option<&str>,
        action: &str,
        entity: &str,
        entity_id: Option<ObjectId>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            tenant_id,
            actor_user_id: actor_user_id.map(str::to_string),
            actor_type: if actor_user_id.is_some() {
                ActorType::User
            } else {
                ActorType::System
            },
            action: action.to_string(),
            entity: entity.to_string(),
            entity_id,
            details,
            created_at: DateTime::now(),
        }
    }
}
