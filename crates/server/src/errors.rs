use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use service::ServiceError;
use thiserror::Error;
use tracing::{error, warn};

/// Record store operation behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Create,
    Replace,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Replace => "replace",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Message used when the backend itself failed.
    fn failure(self) -> &'static str {
        match self {
            Self::List => "read failed",
            Self::Create => "create failed",
            Self::Replace | Self::Update => "update failed",
            Self::Delete => "delete failed",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
}

/// Failure envelope: `{"error": true, "message": ..., "detail"?: ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonApiError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<String>,
}

impl JsonApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), detail: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn from_service(op: Operation, err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(m) => Self::new(StatusCode::BAD_REQUEST, m),
            ServiceError::Conflict(m) => Self::new(StatusCode::CONFLICT, m),
            ServiceError::NotFound(m) => Self::new(StatusCode::NOT_FOUND, m),
            ServiceError::Backend(m) => {
                error!(operation = op.as_str(), error = %m, "record store backend failed");
                Self::new(StatusCode::BAD_GATEWAY, op.failure()).with_detail(m)
            }
        }
    }

    pub fn method_not_allowed(method: &Method) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, format!("method {method} not allowed"))
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: true, message: &self.message, detail: self.detail.as_deref() };
        (self.status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for JsonApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "rejected request body");
        Self::new(StatusCode::BAD_REQUEST, "invalid JSON body").with_detail(rejection.body_text())
    }
}

impl From<QueryRejection> for JsonApiError {
    fn from(rejection: QueryRejection) -> Self {
        warn!(error = %rejection.body_text(), "rejected query string");
        Self::new(StatusCode::BAD_REQUEST, "invalid query string").with_detail(rejection.body_text())
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("record store unavailable: {0}")]
    Store(#[from] ServiceError),
    #[error("runtime check failed: {0}")]
    Runtime(String),
}
