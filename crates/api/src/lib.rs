pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post},
};
use state::AppState;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    // Auth, onboarding and invitation flows
    let auth_routes = Router::new()
        .route("/login", post(routes::auth::login))
        .route("/send-otp", post(routes::auth::send_otp))
        .route("/verify-otp", post(routes::auth::verify_otp))
        .route("/register-tenant", post(routes::auth::register_tenant))
        .route("/validate-token", post(routes::auth::validate_token))
        .route("/me", get(routes::auth::me))
        .route("/logout", post(routes::auth::logout))
        .route("/set-password", post(routes::auth::set_password))
        .route("/invite", post(routes::invitation::invite))
        .route(
            "/invitation/{token}",
            get(routes::invitation::get_invitation).delete(routes::invitation::revoke),
        )
        .route(
            "/accept-invitation",
            post(routes::invitation::accept_invitation),
        )
        .route(
            "/tenant/{tenant_id}/limits",
            get(routes::auth::public_limits),
        )
        .route(
            "/tenant/{tenant_id}/invitations",
            get(routes::invitation::list),
        );

    // Tenant routes
    let tenant_routes = Router::new()
        .route("/check-slug", get(routes::tenant::check_slug))
        .route("/by-slug/{slug}", get(routes::tenant::by_slug))
        .route("/create-with-admin", post(routes::tenant::create_with_admin))
        .route("/user-tenants", get(routes::tenant::user_tenants))
        .route("/create", post(routes::tenant::create))
        .route("/set-default", post(routes::tenant::set_default))
        .route("/clear-default", post(routes::tenant::clear_default))
        .route(
            "/{tenant_id}",
            get(routes::tenant::get).put(routes::tenant::update),
        )
        .route("/{tenant_id}/membership", get(routes::tenant::membership))
        .route(
            "/{tenant_id}/member/{user_id}",
            delete(routes::tenant::remove_member),
        )
        .route(
            "/{tenant_id}/modules",
            get(routes::tenant::modules).post(routes::tenant::set_module),
        )
        .route(
            "/{tenant_id}/modules/bulk",
            post(routes::tenant::enable_modules),
        )
        .route("/{tenant_id}/limits", get(routes::tenant::limits))
        .route("/{tenant_id}/can-add-user", get(routes::tenant::can_add_user))
        .route(
            "/{tenant_id}/can-add-field",
            get(routes::tenant::can_add_field),
        );

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/tenant", tenant_routes);

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(allowed))
    }
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
