//! Generic CRUD handlers, one set shared by every resource kind. The
//! kind-specific controller is attached to each subrouter as an extension.

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use orgtree_core::controller::{ListQuery, ResourceController};
use orgtree_core::principal::Principal;
use orgtree_core::types::{Node, Page};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;

/// Collection query parameters: 0-based `page`, `pagesize` (0 means
/// unpaginated, absent means the configured default), `name` exact match,
/// `iname` case-insensitive substring match.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u64>,
    pub pagesize: Option<u64>,
    pub name: Option<String>,
    pub iname: Option<String>,
}

pub async fn list(
    Extension(controller): Extension<Arc<ResourceController>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Node>>, AppError> {
    let query = ListQuery {
        page: params.page.unwrap_or(0),
        pagesize: params.pagesize,
        name: params.name,
        iname: params.iname,
    };
    Ok(Json(controller.list(&query).await?))
}

pub async fn get_one(
    Extension(controller): Extension<Arc<ResourceController>>,
    Path(oid): Path<Uuid>,
) -> Result<Json<Node>, AppError> {
    Ok(Json(controller.get(oid).await?))
}

pub async fn create(
    Extension(controller): Extension<Arc<ResourceController>>,
    Extension(principal): Extension<Principal>,
    Json(input): Json<Node>,
) -> Result<Json<Node>, AppError> {
    Ok(Json(controller.create(&principal, input).await?))
}

pub async fn replace(
    Extension(controller): Extension<Arc<ResourceController>>,
    Extension(principal): Extension<Principal>,
    Path(oid): Path<Uuid>,
    Json(input): Json<Node>,
) -> Result<Json<Node>, AppError> {
    Ok(Json(controller.replace(&principal, oid, input).await?))
}

pub async fn remove(
    Extension(controller): Extension<Arc<ResourceController>>,
    Extension(principal): Extension<Principal>,
    Path(oid): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    controller.delete(&principal, oid).await?;
    Ok(Json(json!({
        "status": "The object was deleted successfully",
        "ok": 1
    })))
}
