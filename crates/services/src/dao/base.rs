use std::future::Future;
use std::time::Duration;

use bson::{doc, oid::ObjectId, Document};
use cosecha_db::models::Counter;
use futures::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::ReturnDocument,
    Collection, Database,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("BSON serialization error: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("BSON deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),
    #[error("Entity not found")]
    NotFound,
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Quota exceeded for {0}")]
    QuotaExceeded(Counter),
    #[error("Validation: {0}")]
    Validation(String),
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}

pub type DaoResult<T> = Result<T, DaoError>;

/// Maps unique-index violations to `DuplicateKey`, everything else to `Mongo`.
pub(crate) fn write_error(e: mongodb::error::Error) -> DaoError {
    match *e.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref write_error))
            if write_error.code == DUPLICATE_KEY =>
        {
            DaoError::DuplicateKey(write_error.message.clone())
        }
        ErrorKind::Command(ref command_error) if command_error.code == DUPLICATE_KEY => {
            DaoError::DuplicateKey(command_error.message.clone())
        }
        _ => DaoError::Mongo(e),
    }
}

pub struct BaseDao<T: Send + Sync> {
    collection: Collection<T>,
    timeout: Duration,
}

impl<T> BaseDao<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    pub fn new(db: &Database, collection_name: &str, timeout: Duration) -> Self {
        Self {
            collection: db.collection::<T>(collection_name),
            timeout,
        }
    }

    pub fn collection(&self) -> &Collection<T> {
        &self.collection
    }

    /// Bounds a single round-trip so a stalled store surfaces as an error.
    pub async fn bounded<R, F>(&self, fut: F) -> DaoResult<R>
    where
        F: Future<Output = DaoResult<R>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| DaoError::Timeout(self.timeout))?
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<Option<T>> {
        self.find_one(doc! { "_id": id }).await
    }

    pub async fn find_one(&self, filter: Document) -> DaoResult<Option<T>> {
        self.bounded(async { Ok::<_, DaoError>(self.collection.find_one(filter).await?) })
            .await
    }

    pub async fn find_many(&self, filter: Document, sort: Option<Document>) -> DaoResult<Vec<T>> {
        self.bounded(async {
            let mut cursor = match sort {
                Some(sort) => self.collection.find(filter).sort(sort).await?,
                None => self.collection.find(filter).await?,
            };

            let mut results = Vec::new();
            while let Some(doc) = cursor.try_next().await? {
                results.push(doc);
            }
            Ok::<_, DaoError>(results)
        })
        .await
    }

    pub async fn insert_one(&self, doc: &T) -> DaoResult<()> {
        self.bounded(async {
            let result = self.collection.insert_one(doc).await.map_err(write_error)?;
            debug!(id = ?result.inserted_id, "Inserted document");
            Ok::<_, DaoError>(())
        })
        .await
    }

    /// Applies `update` to the single document matching `filter` and returns
    /// it as stored afterwards, or `None` when nothing matched.
    pub async fn find_one_and_update(
        &self,
        filter: Document,
        mut update: Document,
        upsert: bool,
    ) -> DaoResult<Option<T>> {
        stamp_updated_at(&mut update);
        self.bounded(async {
            self.collection
                .find_one_and_update(filter, update)
                .upsert(upsert)
                .return_document(ReturnDocument::After)
                .await
                .map_err(write_error)
        })
        .await
    }

    /// Returns whether a document matched `filter`.
    pub async fn update_one(&self, filter: Document, mut update: Document) -> DaoResult<bool> {
        stamp_updated_at(&mut update);
        self.bounded(async {
            let result = self
                .collection
                .update_one(filter, update)
                .await
                .map_err(write_error)?;
            Ok::<_, DaoError>(result.matched_count > 0)
        })
        .await
    }

    /// Like `update_one`, for collections without an `updated_at` field.
    pub async fn update_one_raw(&self, filter: Document, update: Document) -> DaoResult<bool> {
        self.bounded(async {
            let result = self
                .collection
                .update_one(filter, update)
                .await
                .map_err(write_error)?;
            Ok::<_, DaoError>(result.matched_count > 0)
        })
        .await
    }

    pub async fn delete_by_id(&self, id: ObjectId) -> DaoResult<bool> {
        self.bounded(async {
            let result = self.collection.delete_one(doc! { "_id": id }).await?;
            Ok::<_, DaoError>(result.deleted_count > 0)
        })
        .await
    }

    pub async fn delete_many(&self, filter: Document) -> DaoResult<u64> {
        self.bounded(async {
            let result = self.collection.delete_many(filter).await?;
            Ok::<_, DaoError>(result.deleted_count)
        })
        .await
    }

    pub async fn count(&self, filter: Document) -> DaoResult<u64> {
        self.bounded(async { Ok::<_, DaoError>(self.collection.count_documents(filter).await?) })
            .await
    }
}

fn stamp_updated_at(update: &mut Document) {
    let now = bson::DateTime::now();
    match update.get_document_mut("$set") {
        Ok(set) => {
            set.insert("updated_at", now);
        }
        Err(_) => {
            update.insert("$set", doc! { "updated_at": now });
        }
    }
}
