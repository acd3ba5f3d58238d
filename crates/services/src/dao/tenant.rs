use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use cosecha_db::models::{Counter, Tenant};
use mongodb::Database;

use super::base::{BaseDao, DaoError, DaoResult};
use crate::store::{TenantPatch, TenantStore};

pub struct TenantDao {
    pub base: BaseDao<Tenant>,
}

impl TenantDao {
    pub fn new(db: &Database, timeout: Duration) -> Self {
        Self {
            base: BaseDao::new(db, Tenant::COLLECTION, timeout),
        }
    }

    async fn require(&self, id: ObjectId) -> DaoResult<Tenant> {
        self.base.find_by_id(id).await?.ok_or(DaoError::NotFound)
    }
}

/// `$expr` guard keeping a new maximum at or above the stored usage.
fn max_guard(counter: Counter, max: u32) -> Document {
    doc! {
        "$lte": [format!("${}", counter.current_field()), i64::from(max)]
    }
}

#[async_trait]
impl TenantStore for TenantDao {
    async fn create(&self, tenant: &Tenant) -> DaoResult<()> {
        self.base.insert_one(tenant).await
    }

    async fn get_by_id(&self, id: ObjectId) -> DaoResult<Option<Tenant>> {
        self.base.find_by_id(id).await
    }

    async fn get_by_slug(&self, slug: &str) -> DaoResult<Option<Tenant>> {
        self.base.find_one(doc! { "slug": slug }).await
    }

    async fn list_by_ids(&self, ids: &[ObjectId]) -> DaoResult<Vec<Tenant>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.base
            .find_many(doc! { "_id": { "$in": ids.to_vec() } }, Some(doc! { "name": 1 }))
            .await
    }

    async fn update(&self, id: ObjectId, patch: &TenantPatch) -> DaoResult<Tenant> {
        let mut set = Document::new();
        if let Some(name) = &patch.name {
            set.insert("name", name.as_str());
        }
        if let Some(plan) = &patch.plan {
            set.insert("plan", plan.as_str());
        }
        if let Some(contact_name) = &patch.contact_name {
            set.insert("contact_name", contact_name.as_str());
        }
        if let Some(contact_email) = &patch.contact_email {
            set.insert("contact_email", contact_email.as_str());
        }

        let mut guards: Vec<Bson> = Vec::new();
        for (counter, max) in [
            (Counter::Users, patch.max_users),
            (Counter::Fields, patch.max_fields),
        ] {
            if let Some(max) = max {
                set.insert(counter.max_field(), i64::from(max));
                guards.push(Bson::Document(max_guard(counter, max)));
            }
        }

        let mut filter = doc! { "_id": id };
        if !guards.is_empty() {
            filter.insert("$expr", doc! { "$and": guards });
        }

        match self
            .base
            .find_one_and_update(filter, doc! { "$set": set }, false)
            .await?
        {
            Some(tenant) => Ok(tenant),
            None => {
                let current = self.require(id).await?;
                Err(DaoError::Validation(format!(
                    "limits cannot go below current usage ({} users, {} fields)",
                    current.current_users, current.current_fields
                )))
            }
        }
    }

    async fn delete(&self, id: ObjectId) -> DaoResult<()> {
        if self.base.delete_by_id(id).await? {
            Ok(())
        } else {
            Err(DaoError::NotFound)
        }
    }

    async fn increment(&self, id: ObjectId, counter: Counter) -> DaoResult<Tenant> {
        let current = format!("${}", counter.current_field());
        let max = format!("${}", counter.max_field());
        let filter = doc! {
            "_id": id,
            "$expr": { "$lt": [current, max] },
        };
        let update = doc! { "$inc": { counter.current_field(): 1 } };

        match self.base.find_one_and_update(filter, update, false).await? {
            Some(tenant) => Ok(tenant),
            None => {
                // Either the tenant is gone or the counter sits at its max.
                self.require(id).await?;
                Err(DaoError::QuotaExceeded(counter))
            }
        }
    }

    async fn decrement(&self, id: ObjectId, counter: Counter) -> DaoResult<Tenant> {
        let filter = doc! {
            "_id": id,
            counter.current_field(): { "$gt": 0 },
        };
        let update = doc! { "$inc": { counter.current_field(): -1 } };

        match self.base.find_one_and_update(filter, update, false).await? {
            Some(tenant) => Ok(tenant),
            None => self.require(id).await,
        }
    }
}
