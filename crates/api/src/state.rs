use std::sync::Arc;
use std::time::Duration;

use cosecha_config::{IdentityBackend, Settings, StoreBackend};
use cosecha_db::{connect, indexes::ensure_indexes};
use cosecha_services::{
    AuthService, Clock, GoTrueProvider, IdentityProvider, LocalIdentityProvider, QuotaPolicy,
    ServiceError, SessionTokens, Stores, SystemClock, TenancyOptions, TenantService,
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub tenants: Arc<TenantService>,
}

impl AppState {
    /// Wires stores and identity provider as configured. Connects to MongoDB
    /// and ensures indexes when the mongo backend is selected.
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let stores = match settings.database.backend {
            StoreBackend::Mongo => {
                let db = connect(&settings).await?;
                ensure_indexes(&db).await?;
                Stores::mongo(&db, Duration::from_millis(settings.database.timeout_ms))
            }
            StoreBackend::Memory => Stores::memory(),
        };

        let identity: Arc<dyn IdentityProvider> = match settings.identity.provider {
            IdentityBackend::Gotrue => Arc::new(GoTrueProvider::new(&settings.identity)?),
            IdentityBackend::Local => Arc::new(local_identity(&settings)),
        };

        Ok(Self::from_parts(settings, stores, identity, Arc::new(SystemClock))?)
    }

    pub fn from_parts(
        settings: Settings,
        stores: Stores,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        let policy = Arc::new(QuotaPolicy::from_settings(&settings)?);
        let options = TenancyOptions::from_settings(&settings)?;

        let auth = Arc::new(AuthService::new(
            identity.clone(),
            stores.clone(),
            settings.identity.audience.clone(),
        ));
        let tenants = Arc::new(TenantService::new(stores, identity, policy, clock, options));

        Ok(Self {
            settings,
            auth,
            tenants,
        })
    }
}

pub fn local_identity(settings: &Settings) -> LocalIdentityProvider {
    LocalIdentityProvider::new(SessionTokens::new(
        &settings.identity.jwt_secret,
        &settings.identity.audience,
        settings.identity.token_ttl_secs,
    ))
}
