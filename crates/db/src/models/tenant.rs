use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tenant {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub slug: String,
    pub plan: String,
    pub contact_name: String,
    pub contact_email: String,
    /// Identity-provider subject of the user who provisioned the tenant.
    pub created_by: String,
    pub max_users: u32,
    pub max_fields: u32,
    #[serde(default)]
    pub current_users: u32,
    #[serde(default)]
    pub current_fields: u32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// The two quota-tracked resources of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Users,
    Fields,
}

impl Counter {
    pub fn current_field(self) -> &'static str {
        match self {
            Counter::Users => "current_users",
            Counter::Fields => "current_fields",
        }
    }

    pub fn max_field(self) -> &'static str {
        match self {
            Counter::Users => "max_users",
            Counter::Fields => "max_fields",
        }
    }
}

impl std::fmt::Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Counter::Users => f.write_str("users"),
            Counter::Fields => f.write_str("fields"),
        }
    }
}

impl Tenant {
    pub const COLLECTION: &'static str = "tenants";

    pub fn current(&self, counter: Counter) -> u32 {
        match counter {
            Counter::Users => self.current_users,
            Counter::Fields => self.current_fields,
        }
    }

    pub fn max(&self, counter: Counter) -> u32 {
        match counter {
            Counter::Users => self.max_users,
            Counter::Fields => self.max_fields,
        }
    }

    pub fn available(&self, counter: Counter) -> u32 {
        self.max(counter).saturating_sub(self.current(counter))
    }
}
