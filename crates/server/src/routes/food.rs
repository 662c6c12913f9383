//! `/api/food` handlers. Every method maps onto one `RecordStore` operation.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::Method;
use axum::Json;
use serde::{Deserialize, Serialize};
use service::record::{opt_id, require_id};
use service::{Record, RecordFields, RecordFilter, RecordId, ServiceError};

use super::ServerState;
use crate::errors::{JsonApiError, Operation};
use crate::metrics;

/// `?id=` on PUT, PATCH and DELETE.
#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<RecordId>,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub success: bool,
    pub item: Record,
}

impl From<Record> for ItemResponse {
    fn from(item: Record) -> Self {
        Self { success: true, item }
    }
}

/// Record the outcome and convert failures into the envelope.
fn finish<T>(op: Operation, result: Result<T, ServiceError>) -> Result<T, JsonApiError> {
    match result {
        Ok(v) => {
            metrics::observe(op, "ok");
            Ok(v)
        }
        Err(e) => {
            metrics::observe(op, e.kind());
            Err(JsonApiError::from_service(op, e))
        }
    }
}

fn rejected<R: Into<JsonApiError>>(op: Operation, rejection: R) -> JsonApiError {
    metrics::observe(op, "rejected");
    rejection.into()
}

pub async fn list(
    State(state): State<ServerState>,
    query: Result<Query<RecordFilter>, QueryRejection>,
) -> Result<Json<Vec<Record>>, JsonApiError> {
    let Query(filter) = query.map_err(|r| rejected(Operation::List, r))?;
    let records = finish(Operation::List, state.store.list(&filter).await)?;
    Ok(Json(records))
}

pub async fn create(
    State(state): State<ServerState>,
    body: Result<Json<RecordFields>, JsonRejection>,
) -> Result<Json<ItemResponse>, JsonApiError> {
    let Json(fields) = body.map_err(|r| rejected(Operation::Create, r))?;
    let record = finish(Operation::Create, state.store.create(fields).await)?;
    Ok(Json(record.into()))
}

/// The query-string id wins over one carried in the body.
fn target_id(query: IdQuery, fields: &RecordFields) -> Result<RecordId, ServiceError> {
    require_id(query.id.or_else(|| fields.id.clone()))
}

pub async fn replace(
    State(state): State<ServerState>,
    query: Result<Query<IdQuery>, QueryRejection>,
    body: Result<Json<RecordFields>, JsonRejection>,
) -> Result<Json<ItemResponse>, JsonApiError> {
    let op = Operation::Replace;
    let Query(query) = query.map_err(|r| rejected(op, r))?;
    let Json(fields) = body.map_err(|r| rejected(op, r))?;
    let result = match target_id(query, &fields) {
        Ok(id) => state.store.replace(&id, fields).await,
        Err(e) => Err(e),
    };
    Ok(Json(finish(op, result)?.into()))
}

pub async fn update(
    State(state): State<ServerState>,
    query: Result<Query<IdQuery>, QueryRejection>,
    body: Result<Json<RecordFields>, JsonRejection>,
) -> Result<Json<ItemResponse>, JsonApiError> {
    let op = Operation::Update;
    let Query(query) = query.map_err(|r| rejected(op, r))?;
    let Json(fields) = body.map_err(|r| rejected(op, r))?;
    let result = match target_id(query, &fields) {
        Ok(id) => state.store.update(&id, fields).await,
        Err(e) => Err(e),
    };
    Ok(Json(finish(op, result)?.into()))
}

pub async fn remove(
    State(state): State<ServerState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<Json<ItemResponse>, JsonApiError> {
    let op = Operation::Delete;
    let Query(query) = query.map_err(|r| rejected(op, r))?;
    let result = match require_id(query.id) {
        Ok(id) => state.store.delete(&id).await,
        Err(e) => Err(e),
    };
    Ok(Json(finish(op, result)?.into()))
}

pub async fn method_not_allowed(method: Method) -> JsonApiError {
    JsonApiError::method_not_allowed(&method)
}
