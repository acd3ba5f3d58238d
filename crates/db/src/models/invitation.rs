use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::membership::RoleCode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invitation {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub tenant_id: ObjectId,
    /// Lowercased at creation.
    pub email: String,
    pub role: RoleCode,
    /// Hex SHA-256 of the token handed to the invitee; the token itself is never stored.
    pub token_hash: String,
    pub invited_by: String,
    pub expires_at: DateTime,
    pub accepted_at: Option<DateTime>,
    pub revoked_at: Option<DateTime>,
    /// Set when an expired invitation is replaced by a new one for the same
    /// email. Leaves the derived state at `Expired`.
    #[serde(default)]
    pub superseded_at: Option<DateTime>,
    pub created_at: DateTime,
}

/// Lifecycle position of an invitation. `Expired` is derived from the clock,
/// never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvitationState {
    Pending,
    Accepted,
    Revoked,
    Expired,
}

impl Invitation {
    pub const COLLECTION: &'static str = "invitations";

    /// Revoked wins over accepted, accepted wins over expired.
    pub fn state_at(&self, now: DateTime) -> InvitationState {
        if self.revoked_at.is_some() {
            InvitationState::Revoked
        } else if self.accepted_at.is_some() {
            InvitationState::Accepted
        } else if now > self.expires_at {
            InvitationState::Expired
        } else {
            InvitationState::Pending
        }
    }

    /// Any closing marker is set; the invitation no longer counts as
    /// outstanding for its email.
    pub fn is_closed(&self) -> bool {
        self.accepted_at.is_some() || self.revoked_at.is_some() || self.superseded_at.is_some()
    }
}
