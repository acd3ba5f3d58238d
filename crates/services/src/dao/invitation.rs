use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use cosecha_db::models::Invitation;
use mongodb::Database;

use super::base::{BaseDao, DaoError, DaoResult};
use crate::store::InvitationStore;

pub struct InvitationDao {
    pub base: BaseDao<Invitation>,
}

impl InvitationDao {
    pub fn new(db: &Database, timeout: Duration) -> Self {
        Self {
            base: BaseDao::new(db, Invitation::COLLECTION, timeout),
        }
    }

    /// Writes `marker` only while the invitation is still open.
    async fn close(&self, id: ObjectId, marker: &str, at: DateTime) -> DaoResult<bool> {
        let mut filter = open_filter();
        filter.insert("_id", id);
        let mut set = Document::new();
        set.insert(marker, at);
        self.base.update_one_raw(filter, doc! { "$set": set }).await
    }
}

fn open_filter() -> Document {
    doc! {
        "accepted_at": { "$type": "null" },
        "revoked_at": { "$type": "null" },
        "superseded_at": { "$type": "null" },
    }
}

#[async_trait]
impl InvitationStore for InvitationDao {
    async fn create(&self, invitation: &Invitation) -> DaoResult<()> {
        self.base.insert_one(invitation).await
    }

    async fn get_by_id(&self, id: ObjectId) -> DaoResult<Option<Invitation>> {
        self.base.find_by_id(id).await
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> DaoResult<Option<Invitation>> {
        self.base.find_one(doc! { "token_hash": token_hash }).await
    }

    async fn find_outstanding(
        &self,
        tenant_id: ObjectId,
        email: &str,
    ) -> DaoResult<Option<Invitation>> {
        let mut filter = open_filter();
        filter.insert("tenant_id", tenant_id);
        filter.insert("email", email);
        self.base.find_one(filter).await
    }

    async fn list_by_tenant(&self, tenant_id: ObjectId) -> DaoResult<Vec<Invitation>> {
        self.base
            .find_many(doc! { "tenant_id": tenant_id }, Some(doc! { "created_at": -1 }))
            .await
    }

    async fn mark_accepted(&self, id: ObjectId, at: DateTime) -> DaoResult<bool> {
        self.close(id, "accepted_at", at).await
    }

    async fn mark_revoked(&self, id: ObjectId, at: DateTime) -> DaoResult<bool> {
        self.close(id, "revoked_at", at).await
    }

    async fn mark_superseded(&self, id: ObjectId, at: DateTime) -> DaoResult<bool> {
        self.close(id, "superseded_at", at).await
    }

    async fn delete(&self, id: ObjectId) -> DaoResult<()> {
        if self.base.delete_by_id(id).await? {
            Ok(())
        } else {
            Err(DaoError::NotFound)
        }
    }
}
