use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Per-user metadata, keyed by the identity-provider subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    /// Weak pointer: the tenant may be gone or the membership inactive.
    pub default_tenant_id: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Profile {
    pub const COLLECTION: &'static str = "profiles";
}
