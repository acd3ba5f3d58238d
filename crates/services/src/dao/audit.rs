use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use cosecha_db::models::AuditLog;
use mongodb::Database;

use super::base::{BaseDao, DaoResult};
use crate::store::AuditStore;

pub struct AuditDao {
    pub base: BaseDao<AuditLog>,
}

impl AuditDao {
    pub fn new(db: &Database, timeout: Duration) -> Self {
        Self {
            base: BaseDao::new(db, AuditLog::COLLECTION, timeout),
        }
    }
}

#[async_trait]
impl AuditStore for AuditDao {
    async fn append(&self, entry: &AuditLog) -> DaoResult<()> {
        self.base.insert_one(entry).await
    }

    async fn list_by_tenant(&self, tenant_id: ObjectId, limit: i64) -> DaoResult<Vec<AuditLog>> {
        self.base
            .bounded(async {
                let mut cursor = self
                    .base
                    .collection()
                    .find(doc! { "tenant_id": tenant_id })
                    .sort(doc! { "created_at": -1 })
                    .limit(limit)
                    .await?;
                let mut entries = Vec::new();
                use futures::TryStreamExt;
                while let Some(entry) = cursor.try_next().await? {
                    entries.push(entry);
                }
                Ok::<_, super::base::DaoError>(entries)
            })
            .await
    }
}
