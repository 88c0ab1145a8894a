use std::sync::Arc;

use axum::extract::{OriginalUri, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use gifstash_gate::{Admission, AuthenticatedRequest, RequestContext};
use tracing::debug;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// The token in the `Authorization` header, with an optional `Bearer ` prefix.
pub fn bearer_token(headers: &HeaderMap) -> String {
    let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return String::new();
    };
    let value = value.trim();
    value.strip_prefix("Bearer ").unwrap_or(value).trim().to_string()
}

/// Run the request pipeline and attach the resulting context.
///
/// Handlers behind this layer extract `Extension<Arc<RequestContext>>`;
/// the tenant lease is released once the last clone is dropped.
pub async fn admit(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ServerResult<Response> {
    let path = match request.extensions().get::<OriginalUri>() {
        Some(OriginalUri(uri)) => uri.path().to_string(),
        None => request.uri().path().to_string(),
    };
    let token = bearer_token(request.headers());
    let pipeline = state.pipeline.clone();

    let (context, admission) = tokio::task::spawn_blocking(move || {
        let mut context = RequestContext::new(AuthenticatedRequest::new(path, token));
        let admission = pipeline.run(&mut context);
        (context, admission)
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))?;

    if let Admission::Denied { stage, reason } = admission? {
        debug!(path = %context.request.path, %stage, %reason, "request refused");
        return Err(ServerError::PermissionDenied(context.request.path.clone()));
    }

    request.extensions_mut().insert(Arc::new(context));
    Ok(next.run(request).await)
}
