use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub identity: IdentitySettings,
    pub tenancy: TenancySettings,
    pub plans: HashMap<String, PlanSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Base URL of the web client; invitation links point here.
    pub frontend_url: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub backend: StoreBackend,
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
    /// Upper bound for a single store round-trip.
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentityBackend {
    Gotrue,
    Local,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdentitySettings {
    pub provider: IdentityBackend,
    pub url: String,
    pub anon_key: String,
    pub service_role_key: String,
    /// HS256 secret the provider signs session tokens with.
    pub jwt_secret: String,
    pub audience: String,
    pub timeout_ms: u64,
    /// Session lifetime for tokens minted by the local provider.
    pub token_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TenancySettings {
    pub default_plan: String,
    pub countable_roles: Vec<String>,
    pub default_modules: Vec<String>,
    pub invitation_ttl_hours: i64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PlanSettings {
    pub max_users: u32,
    pub max_fields: u32,
    #[serde(default)]
    pub rank: u32,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("COSECHA")
                    .list_separator(",")
                    .with_list_parse_key("app.cors_origins")
                    .with_list_parse_key("tenancy.countable_roles")
                    .with_list_parse_key("tenancy.default_modules")
                    .try_parsing(true),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("app.frontend_url", "http://localhost:3000")?
            .set_default("database.backend", "mongo")?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "cosecha")?
            .set_default("database.timeout_ms", 5000)?
            .set_default("identity.provider", "gotrue")?
            .set_default("identity.url", "http://localhost:9999")?
            .set_default("identity.anon_key", "")?
            .set_default("identity.service_role_key", "")?
            .set_default("identity.jwt_secret", "change-me-in-production")?
            .set_default("identity.audience", "authenticated")?
            .set_default("identity.timeout_ms", 10000)?
            .set_default("identity.token_ttl_secs", 3600)?
            .set_default("tenancy.default_plan", "basico")?
            .set_default(
                "tenancy.countable_roles",
                strings(&["admin", "campo", "empaque", "finanzas"]),
            )?
            .set_default("tenancy.default_modules", strings(&["dashboard", "usuarios"]))?
            .set_default("tenancy.invitation_ttl_hours", 24)?
            .set_default("plans.basico.max_users", 10)?
            .set_default("plans.basico.max_fields", 5)?
            .set_default("plans.basico.rank", 0)?
            .set_default("plans.profesional.max_users", 30)?
            .set_default("plans.profesional.max_fields", 20)?
            .set_default("plans.profesional.rank", 1)?
            .set_default("plans.enterprise.max_users", 100)?
            .set_default("plans.enterprise.max_fields", 100)?
            .set_default("plans.enterprise.rank", 2)?
            .build()?;

        config.try_deserialize()
    }

    /// Self-contained settings: in-memory store and local identity provider.
    /// Used by tests and by `COSECHA__DATABASE__BACKEND=memory` dev runs.
    pub fn standalone() -> Self {
        let mut plans = HashMap::new();
        plans.insert(
            "basico".to_string(),
            PlanSettings { max_users: 10, max_fields: 5, rank: 0 },
        );
        plans.insert(
            "profesional".to_string(),
            PlanSettings { max_users: 30, max_fields: 20, rank: 1 },
        );
        plans.insert(
            "enterprise".to_string(),
            PlanSettings { max_users: 100, max_fields: 100, rank: 2 },
        );

        Self {
            app: AppSettings {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec![],
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseSettings {
                backend: StoreBackend::Memory,
                url: String::new(),
                name: "cosecha".to_string(),
                max_pool_size: None,
                min_pool_size: None,
                timeout_ms: 5000,
            },
            identity: IdentitySettings {
                provider: IdentityBackend::Local,
                url: String::new(),
                anon_key: String::new(),
                service_role_key: String::new(),
                jwt_secret: "local-secret-key-for-jwt-signing-minimum-32-chars".to_string(),
                audience: "authenticated".to_string(),
                timeout_ms: 10000,
                token_ttl_secs: 3600,
            },
            tenancy: TenancySettings {
                default_plan: "basico".to_string(),
                countable_roles: strings(&["admin", "campo", "empaque", "finanzas"]),
                default_modules: strings(&["dashboard", "usuarios"]),
                invitation_ttl_hours: 24,
            },
            plans,
        }
    }
}
