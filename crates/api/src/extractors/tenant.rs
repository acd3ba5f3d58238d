use std::collections::HashMap;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use bson::oid::ObjectId;

use crate::error::ApiError;

/// The `{tenant_id}` path parameter as an ObjectId.
#[derive(Debug, Clone, Copy)]
pub struct TenantId(pub ObjectId);

impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(params): Path<HashMap<String, String>> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::BadRequest("Missing path parameters".to_string()))?;

        let raw = params
            .get("tenant_id")
            .ok_or_else(|| ApiError::BadRequest("Missing tenant_id parameter".to_string()))?;

        parse_object_id(raw, "tenant_id").map(TenantId)
    }
}

pub fn parse_object_id(raw: &str, name: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {name} format")))
}
