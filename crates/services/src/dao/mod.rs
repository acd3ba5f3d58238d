pub mod audit;
pub mod base;
pub mod invitation;
pub mod membership;
pub mod module;
pub mod profile;
pub mod tenant;

pub use audit::AuditDao;
pub use base::{BaseDao, DaoError, DaoResult};
pub use invitation::InvitationDao;
pub use membership::MembershipDao;
pub use module::ModuleDao;
pub use profile::ProfileDao;
pub use tenant::TenantDao;
