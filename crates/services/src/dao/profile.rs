use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, DateTime, Document};
use cosecha_db::models::Profile;
use mongodb::Database;

use super::base::{BaseDao, DaoError, DaoResult};
use crate::store::{ProfileStore, ProfileUpdate};

pub struct ProfileDao {
    pub base: BaseDao<Profile>,
}

impl ProfileDao {
    pub fn new(db: &Database, timeout: Duration) -> Self {
        Self {
            base: BaseDao::new(db, Profile::COLLECTION, timeout),
        }
    }
}

#[async_trait]
impl ProfileStore for ProfileDao {
    async fn get(&self, user_id: &str) -> DaoResult<Option<Profile>> {
        self.base.find_one(doc! { "_id": user_id }).await
    }

    async fn upsert(&self, user_id: &str, update: &ProfileUpdate) -> DaoResult<Profile> {
        let mut set = Document::new();
        if let Some(full_name) = &update.full_name {
            set.insert("full_name", full_name.as_str());
        }
        if let Some(phone) = &update.phone {
            set.insert("phone", phone.as_str());
        }
        if let Some(tenant_id) = update.default_tenant_id {
            set.insert("default_tenant_id", tenant_id);
        }

        self.base
            .find_one_and_update(
                doc! { "_id": user_id },
                doc! {
                    "$set": set,
                    "$setOnInsert": { "created_at": DateTime::now() },
                },
                true,
            )
            .await?
            .ok_or(DaoError::NotFound)
    }

    async fn clear_default_tenant(&self, user_id: &str) -> DaoResult<()> {
        self.base
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "default_tenant_id": null } },
            )
            .await?;
        Ok(())
    }
}
