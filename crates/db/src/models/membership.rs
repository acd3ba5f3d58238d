use std::str::FromStr;

use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub tenant_id: ObjectId,
    pub user_id: String,
    pub role: RoleCode,
    #[serde(default)]
    pub status: MembershipStatus,
    pub invited_by: Option<String>,
    pub accepted_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoleCode {
    Owner,
    Admin,
    Campo,
    Empaque,
    Finanzas,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    #[default]
    Active,
    Pending,
    Inactive,
}

#[derive(Debug, Error)]
#[error("unknown {kind} code: {value}")]
pub struct UnknownCode {
    pub kind: &'static str,
    pub value: String,
}

impl RoleCode {
    pub const ALL: [RoleCode; 5] = [
        RoleCode::Owner,
        RoleCode::Admin,
        RoleCode::Campo,
        RoleCode::Empaque,
        RoleCode::Finanzas,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RoleCode::Owner => "owner",
            RoleCode::Admin => "admin",
            RoleCode::Campo => "campo",
            RoleCode::Empaque => "empaque",
            RoleCode::Finanzas => "finanzas",
        }
    }

    /// Roles allowed to manage the tenant (invite, revoke, configure).
    pub fn is_manager(self) -> bool {
        matches!(self, RoleCode::Owner | RoleCode::Admin)
    }
}

impl FromStr for RoleCode {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleCode::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownCode {
                kind: "role",
                value: s.to_string(),
            })
    }
}

impl std::fmt::Display for RoleCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MembershipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Pending => "pending",
            MembershipStatus::Inactive => "inactive",
        }
    }
}

impl Membership {
    pub const COLLECTION: &'static str = "tenant_memberships";
}
