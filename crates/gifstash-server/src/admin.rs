//! Account administration routes.

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use gifstash_gate::AccountKey;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PermissionsBody {
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DatastoreBody {
    pub datastore: String,
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> ServerResult<T> {
    serde_json::from_slice(body).map_err(|e| ServerError::Malformed(e.to_string()))
}

async fn blocking<T, F>(op: F) -> ServerResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ServerResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
}

pub async fn list_accounts(State(state): State<AppState>) -> ServerResult<Json<serde_json::Value>> {
    let ids = blocking(move || Ok(state.accounts.list_ids()?)).await?;
    Ok(Json(json!({ "ids": ids })))
}

pub async fn create_account(State(state): State<AppState>, body: Bytes) -> ServerResult<Response> {
    let request: PermissionsBody = if body.is_empty() {
        PermissionsBody::default()
    } else {
        decode(&body)?
    };
    let account = blocking(move || Ok(state.accounts.create_account(request.permissions)?)).await?;
    Ok(Json(account).into_response())
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Response> {
    let raw = blocking(move || Ok(state.accounts.find_raw_by_id(&id)?)).await?;
    Ok(([(CONTENT_TYPE, "application/json")], raw).into_response())
}

pub async fn revoke_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<StatusCode> {
    blocking(move || Ok(state.accounts.revoke_account(&id)?)).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn grant_permissions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ServerResult<StatusCode> {
    let request: PermissionsBody = decode(&body)?;
    blocking(move || Ok(state.accounts.grant_permissions(AccountKey::Id(&id), &request.permissions)?)).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn revoke_permissions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ServerResult<StatusCode> {
    let request: PermissionsBody = decode(&body)?;
    blocking(move || Ok(state.accounts.revoke_permissions(AccountKey::Id(&id), &request.permissions)?)).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn set_datastore(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ServerResult<StatusCode> {
    let request: DatastoreBody = decode(&body)?;
    if request.datastore == state.config.config_store {
        return Err(ServerError::Malformed("datastore name is reserved".into()));
    }
    blocking(move || Ok(state.accounts.set_datastore(AccountKey::Id(&id), &request.datastore)?)).await?;
    Ok(StatusCode::ACCEPTED)
}
