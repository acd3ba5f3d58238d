use cosecha_api::{build_router, state::AppState};
use cosecha_config::Settings;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "cosecha_api=debug,cosecha_services=debug,cosecha_db=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    let settings = Settings::load()?;
    info!("Starting Cosecha API on {}:{}", settings.app.host, settings.app.port);
    info!(
        store = ?settings.database.backend,
        identity = ?settings.identity.provider,
        default_plan = %settings.tenancy.default_plan,
        "Backends"
    );

    // Stores, identity provider and services
    let app_state = AppState::new(settings.clone()).await?;

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
