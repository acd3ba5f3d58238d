use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime};
use cosecha_db::models::{ModuleCode, TenantModule};
use mongodb::Database;

use super::base::{BaseDao, DaoResult};
use crate::store::ModuleStore;

pub struct ModuleDao {
    pub base: BaseDao<TenantModule>,
}

impl ModuleDao {
    pub fn new(db: &Database, timeout: Duration) -> Self {
        Self {
            base: BaseDao::new(db, TenantModule::COLLECTION, timeout),
        }
    }
}

#[async_trait]
impl ModuleStore for ModuleDao {
    async fn list_enabled(&self, tenant_id: ObjectId) -> DaoResult<Vec<TenantModule>> {
        self.base
            .find_many(
                doc! { "tenant_id": tenant_id, "enabled": true },
                Some(doc! { "module_code": 1 }),
            )
            .await
    }

    async fn set(
        &self,
        tenant_id: ObjectId,
        codes: &[ModuleCode],
        enabled: bool,
    ) -> DaoResult<()> {
        for code in codes {
            self.base
                .find_one_and_update(
                    doc! { "tenant_id": tenant_id, "module_code": code.as_str() },
                    doc! {
                        "$set": { "enabled": enabled },
                        "$setOnInsert": { "_id": ObjectId::new(), "created_at": DateTime::now() },
                    },
                    true,
                )
                .await?;
        }
        Ok(())
    }

    async fn delete_for_tenant(&self, tenant_id: ObjectId) -> DaoResult<()> {
        self.base.delete_many(doc! { "tenant_id": tenant_id }).await?;
        Ok(())
    }
}
