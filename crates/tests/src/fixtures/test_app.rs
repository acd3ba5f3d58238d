use std::net::SocketAddr;
use std::sync::Arc;

use bson::DateTime;
use cosecha_api::{
    build_router,
    state::{AppState, local_identity},
};
use cosecha_config::Settings;
use cosecha_services::{LocalIdentityProvider, ManualClock, MemoryStore, Stores};
use tokio::net::TcpListener;

/// A running test application backed by the in-memory store and the local
/// identity provider. Each instance is fully isolated.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub settings: Settings,
    pub client: reqwest::Client,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    /// Inspect sent mail (OTP codes, invitation links) through this handle.
    pub identity: Arc<LocalIdentityProvider>,
    /// Drives invitation expiry.
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn a test server with customized settings.
    ///
    /// The `mutator` closure receives a `&mut Settings` after the standalone
    /// defaults are applied.
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = Settings::standalone();
        mutator(&mut settings);

        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(local_identity(&settings));
        let clock = Arc::new(ManualClock::new(DateTime::now()));

        let app_state = AppState::from_parts(
            settings.clone(),
            Stores::from_memory(store.clone()),
            identity.clone(),
            clock.clone(),
        )
        .expect("Failed to create AppState");
        let app = build_router(app_state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            base_url,
            settings,
            client,
            state: app_state,
            store,
            identity,
            clock,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
