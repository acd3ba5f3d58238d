pub mod auth;
pub mod clock;
pub mod dao;
pub mod error;
pub mod identity;
pub mod store;
pub mod tenancy;

pub use auth::{AuthService, AuthUser};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dao::*;
pub use error::{ServiceError, ServiceResult};
pub use identity::{GoTrueProvider, IdentityProvider, LocalIdentityProvider, SessionTokens};
pub use store::{MemoryStore, Stores};
pub use tenancy::{QuotaPolicy, TenancyOptions, TenantService};
