use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{AuditLog, Invitation, Membership, Tenant, TenantModule};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Tenants
    create_indexes(
        db,
        Tenant::COLLECTION,
        vec![
            index_unique(bson::doc! { "slug": 1 }),
            index(bson::doc! { "created_by": 1 }),
        ],
    )
    .await?;

    // Memberships: one active membership per (tenant, user)
    create_indexes(
        db,
        Membership::COLLECTION,
        vec![
            index_unique_where(
                bson::doc! { "tenant_id": 1, "user_id": 1 },
                bson::doc! { "status": "active" },
            ),
            index(bson::doc! { "user_id": 1, "status": 1 }),
        ],
    )
    .await?;

    // Invitations: one outstanding invitation per (tenant, email)
    create_indexes(
        db,
        Invitation::COLLECTION,
        vec![
            index_unique(bson::doc! { "token_hash": 1 }),
            index_unique_where(
                bson::doc! { "tenant_id": 1, "email": 1 },
                bson::doc! {
                    "accepted_at": { "$type": "null" },
                    "revoked_at": { "$type": "null" },
                    "superseded_at": { "$type": "null" },
                },
            ),
            index(bson::doc! { "tenant_id": 1, "created_at": -1 }),
        ],
    )
    .await?;

    // Tenant modules
    create_indexes(
        db,
        TenantModule::COLLECTION,
        vec![index_unique(bson::doc! { "tenant_id": 1, "module_code": 1 })],
    )
    .await?;

    // Audit Logs
    create_indexes(
        db,
        AuditLog::COLLECTION,
        vec![
            index(bson::doc! { "tenant_id": 1, "created_at": -1 }),
            index(bson::doc! { "tenant_id": 1, "action": 1, "created_at": -1 }),
            index(bson::doc! { "tenant_id": 1, "actor_user_id": 1, "created_at": -1 }),
        ],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn index_unique_where(keys: bson::Document, filter: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .unique(true)
                .partial_filter_expression(filter)
                .build(),
        )
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
