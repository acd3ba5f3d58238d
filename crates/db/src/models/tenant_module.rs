use std::str::FromStr;

use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::membership::UnknownCode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantModule {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub tenant_id: ObjectId,
    pub module_code: ModuleCode,
    pub enabled: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModuleCode {
    Dashboard,
    Campo,
    Empaque,
    Finanzas,
    Inventario,
    Usuarios,
    Trabajadores,
    Ajustes,
}

impl ModuleCode {
    pub const ALL: [ModuleCode; 8] = [
        ModuleCode::Dashboard,
        ModuleCode::Campo,
        ModuleCode::Empaque,
        ModuleCode::Finanzas,
        ModuleCode::Inventario,
        ModuleCode::Usuarios,
        ModuleCode::Trabajadores,
        ModuleCode::Ajustes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleCode::Dashboard => "dashboard",
            ModuleCode::Campo => "campo",
            ModuleCode::Empaque => "empaque",
            ModuleCode::Finanzas => "finanzas",
            ModuleCode::Inventario => "inventario",
            ModuleCode::Usuarios => "usuarios",
            ModuleCode::Trabajadores => "trabajadores",
            ModuleCode::Ajustes => "ajustes",
        }
    }
}

impl FromStr for ModuleCode {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleCode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownCode {
                kind: "module",
                value: s.to_string(),
            })
    }
}

impl TenantModule {
    pub const COLLECTION: &'static str = "tenant_modules";
}
