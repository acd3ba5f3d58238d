use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use cosecha_db::models::{Membership, MembershipStatus};
use mongodb::Database;

use super::base::{BaseDao, DaoError, DaoResult};
use crate::store::MembershipStore;

pub struct MembershipDao {
    pub base: BaseDao<Membership>,
}

impl MembershipDao {
    pub fn new(db: &Database, timeout: Duration) -> Self {
        Self {
            base: BaseDao::new(db, Membership::COLLECTION, timeout),
        }
    }
}

#[async_trait]
impl MembershipStore for MembershipDao {
    async fn create(&self, membership: &Membership) -> DaoResult<()> {
        self.base.insert_one(membership).await
    }

    async fn get_active(
        &self,
        tenant_id: ObjectId,
        user_id: &str,
    ) -> DaoResult<Option<Membership>> {
        self.base
            .find_one(doc! {
                "tenant_id": tenant_id,
                "user_id": user_id,
                "status": MembershipStatus::Active.as_str(),
            })
            .await
    }

    async fn list_active_by_user(&self, user_id: &str) -> DaoResult<Vec<Membership>> {
        self.base
            .find_many(
                doc! { "user_id": user_id, "status": MembershipStatus::Active.as_str() },
                Some(doc! { "created_at": 1 }),
            )
            .await
    }

    async fn list_by_tenant(&self, tenant_id: ObjectId) -> DaoResult<Vec<Membership>> {
        self.base
            .find_many(doc! { "tenant_id": tenant_id }, Some(doc! { "created_at": 1 }))
            .await
    }

    async fn deactivate(&self, id: ObjectId) -> DaoResult<Option<Membership>> {
        self.base
            .find_one_and_update(
                doc! { "_id": id, "status": MembershipStatus::Active.as_str() },
                doc! { "$set": { "status": MembershipStatus::Inactive.as_str() } },
                false,
            )
            .await
    }

    async fn delete(&self, id: ObjectId) -> DaoResult<()> {
        if self.base.delete_by_id(id).await? {
            Ok(())
        } else {
            Err(DaoError::NotFound)
        }
    }
}
