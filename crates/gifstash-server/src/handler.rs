use std::sync::Arc;

use std::net::SocketAddr;

use axum::extract::{OriginalUri, Path, State};
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::Extension;
use bytes::Bytes;
use gifstash_gate::RequestContext;
use gifstash_store::{ImagePayload, NamespaceStore, StoreError, StoreResult, IMAGE_MEDIA_TYPE};
use gifstash_types::ObjectId;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct KeyPath {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadPath {
    pub key: String,
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct SamplePath {
    pub key: String,
    pub count: String,
}

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Run `op` against the leased tenant store on the blocking pool.
async fn with_objects<T, F>(context: Arc<RequestContext>, op: F) -> ServerResult<T>
where
    T: Send + 'static,
    F: FnOnce(NamespaceStore<'_>) -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || -> ServerResult<T> {
        let lease = context
            .lease
            .as_ref()
            .ok_or_else(|| ServerError::Internal("request has no tenant datastore".into()))?;
        Ok(op(lease.objects())?)
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))?
}

/// Everything in the request path before `/gifs`, so generated links keep
/// any tenant prefix the caller used.
fn route_prefix(path: &str) -> &str {
    path.find("/gifs").map_or("", |at| &path[..at])
}

pub async fn list_categories(
    Extension(context): Extension<Arc<RequestContext>>,
) -> ServerResult<Json<serde_json::Value>> {
    let categories = with_objects(context, |objects| objects.list_namespaces()).await?;
    Ok(Json(json!({ "categories": categories })))
}

pub async fn retrieve(
    Extension(context): Extension<Arc<RequestContext>>,
    Path(path): Path<KeyPath>,
) -> ServerResult<Response> {
    let data = with_objects(context, move |objects| objects.retrieve_object(&path.key)).await?;
    Ok(([(CONTENT_TYPE, IMAGE_MEDIA_TYPE)], data).into_response())
}

pub async fn report() -> ServerResult<Response> {
    Err(ServerError::NotImplemented("report".into()))
}

pub async fn upload(
    State(state): State<AppState>,
    Extension(context): Extension<Arc<RequestContext>>,
    Path(path): Path<UploadPath>,
    body: Bytes,
) -> ServerResult<Response> {
    let data = match path.kind.as_str() {
        "gif" => body.to_vec(),
        "link" => {
            let url = std::str::from_utf8(&body)
                .map_err(|_| ServerError::Malformed("link is not UTF-8".into()))?
                .trim();
            state.fetcher.fetch(url).await?
        }
        other => return Err(ServerError::Malformed(format!("unsupported upload kind: {other}"))),
    };

    let namespace = path.key;
    let id = with_objects(context, move |objects| {
        let payload = ImagePayload::decode(data)?;
        objects.store_object(&namespace, &payload)
    })
    .await?;
    info!(%id, "stored upload");
    Ok((StatusCode::CREATED, Json(json!({ "uuid": id.to_string() }))).into_response())
}

pub async fn random_redirect(
    Extension(context): Extension<Arc<RequestContext>>,
    Path(path): Path<KeyPath>,
) -> ServerResult<Response> {
    let prefix = route_prefix(&context.request.path).to_string();
    let namespace = path.key;
    let picked = with_objects(context, move |objects| {
        let sampled = objects.sample_namespace(&namespace, 1)?;
        sampled
            .into_iter()
            .next()
            .ok_or(StoreError::NamespaceNotFound(namespace))
    })
    .await?;
    Ok(Redirect::temporary(&format!("{prefix}/gifs/{picked}")).into_response())
}

pub async fn random_sample(
    State(state): State<AppState>,
    Extension(context): Extension<Arc<RequestContext>>,
    Path(path): Path<SamplePath>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> ServerResult<Json<serde_json::Value>> {
    let count: usize = path
        .count
        .parse()
        .map_err(|_| ServerError::Malformed(format!("invalid count: {}", path.count)))?;
    if count > state.config.max_random_count {
        return Err(ServerError::Malformed(format!(
            "count {count} exceeds {}",
            state.config.max_random_count
        )));
    }
    let host = request_host(&headers, &uri, state.config.bind_addr);
    let prefix = route_prefix(&context.request.path).to_string();

    let namespace = path.key;
    let picked: Vec<ObjectId> =
        with_objects(context, move |objects| objects.sample_namespace(&namespace, count)).await?;
    let locations: Vec<String> = picked
        .iter()
        .map(|id| format!("http://{host}{prefix}/gifs/{id}"))
        .collect();
    Ok(Json(json!({ "locations": locations })))
}

/// Authority for absolute links: the `Host` header, then the request URI
/// (HTTP/2 `:authority`), then the listening address.
fn request_host(headers: &HeaderMap, uri: &Uri, fallback: SocketAddr) -> String {
    headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
        .unwrap_or_else(|| fallback.to_string())
}
