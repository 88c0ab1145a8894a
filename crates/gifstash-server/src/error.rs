use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use gifstash_gate::GateError;
use gifstash_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// The category a failure falls into, independent of where it arose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unavailable,
    InvalidContent,
    InvalidPattern,
    PermissionDenied,
    Malformed,
    NotImplemented,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidContent => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::InvalidPattern => StatusCode::BAD_REQUEST,
            Self::PermissionDenied => StatusCode::UNAUTHORIZED,
            Self::Malformed => StatusCode::NOT_ACCEPTABLE,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("access denied: {0}")]
    PermissionDenied(String),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("gate error: {0}")]
    Gate(#[from] GateError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Malformed(_) => ErrorKind::Malformed,
            Self::InvalidContent(_) => ErrorKind::InvalidContent,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
            Self::Gate(err) => gate_kind(err),
            Self::Store(err) => store_kind(err),
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

fn gate_kind(err: &GateError) -> ErrorKind {
    match err {
        GateError::InvalidPattern { .. } => ErrorKind::InvalidPattern,
        GateError::AccountNotFound(_) | GateError::TenantNotFound(_) => ErrorKind::NotFound,
        GateError::Bootstrap(_) | GateError::StageError { .. } => ErrorKind::Internal,
        GateError::Store(err) => store_kind(err),
    }
}

fn store_kind(err: &StoreError) -> ErrorKind {
    match err {
        StoreError::RecordNotFound(_)
        | StoreError::ObjectNotFound(_)
        | StoreError::NamespaceNotFound(_) => ErrorKind::NotFound,
        StoreError::InvalidContent(_) => ErrorKind::InvalidContent,
        StoreError::InvalidDatastore(_) => ErrorKind::Malformed,
        StoreError::Unavailable(_)
        | StoreError::TableMissing(_)
        | StoreError::Serialization(_)
        | StoreError::Database(_) => ErrorKind::Unavailable,
    }
}

/// The innermost message, without the layer prefixes added on the way up.
fn detail(err: &ServerError) -> String {
    match err {
        ServerError::Gate(GateError::Store(inner)) | ServerError::Store(inner) => inner.to_string(),
        ServerError::Gate(inner) => inner.to_string(),
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match kind {
            ErrorKind::NotFound | ErrorKind::InvalidPattern | ErrorKind::Malformed => detail(&self),
            ErrorKind::Unavailable => {
                warn!(error = %self, "service unavailable");
                "Service Unavailable".to_string()
            }
            ErrorKind::InvalidContent => "Invalid Content".to_string(),
            ErrorKind::PermissionDenied => "Access Denied".to_string(),
            ErrorKind::NotImplemented => "Not Implemented".to_string(),
            ErrorKind::Internal => {
                warn!(error = %self, "internal error");
                "Internal Server Error".to_string()
            }
        };
        (kind.status(), Json(json!({ "error": message }))).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_statuses() {
        let cases = [
            (ServerError::Store(StoreError::ObjectNotFound("x".into())), StatusCode::NOT_FOUND),
            (ServerError::Store(StoreError::Unavailable("locked".into())), StatusCode::SERVICE_UNAVAILABLE),
            (ServerError::Store(StoreError::TableMissing("t".into())), StatusCode::SERVICE_UNAVAILABLE),
            (ServerError::Store(StoreError::InvalidContent("bad".into())), StatusCode::UNSUPPORTED_MEDIA_TYPE),
            (
                ServerError::Gate(GateError::InvalidPattern { pattern: "(".into(), reason: "r".into() }),
                StatusCode::BAD_REQUEST,
            ),
            (ServerError::Gate(GateError::TenantNotFound("/gifs".into())), StatusCode::NOT_FOUND),
            (ServerError::PermissionDenied("/admin".into()), StatusCode::UNAUTHORIZED),
            (ServerError::Malformed("count".into()), StatusCode::NOT_ACCEPTABLE),
            (ServerError::NotImplemented("report".into()), StatusCode::NOT_IMPLEMENTED),
        ];
        for (err, status) in cases {
            assert_eq!(err.kind().status(), status, "{err}");
        }
    }

    #[test]
    fn nested_store_errors_keep_their_kind() {
        let err = ServerError::Gate(GateError::Store(StoreError::ObjectNotFound("x".into())));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(detail(&err), "x does not exist");
    }
}
