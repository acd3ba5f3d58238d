pub mod audit_log;
pub mod invitation;
pub mod membership;
pub mod profile;
pub mod tenant;
pub mod tenant_module;

pub use audit_log::{ActorType, AuditLog};
pub use invitation::{Invitation, InvitationState};
pub use membership::{Membership, MembershipStatus, RoleCode, UnknownCode};
pub use profile::Profile;
pub use tenant::{Counter, Tenant};
pub use tenant_module::{ModuleCode, TenantModule};
