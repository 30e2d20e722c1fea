//! Error responses and the top-level error boundary.
//!
//! # Responsibilities
//! - Define the single error type handlers return
//! - Render errors as `{"code": <int>, "data": {"message": <string>}}`
//! - Log every error exactly once, at the outermost boundary
//! - Turn handler panics into the same error body
//!
//! # Design Decisions
//! - Status defaults to 500, code to 1, message to "unknown error"
//! - Errors are rendered before any body byte is sent (handlers never stream before failing)
//! - Backend timeouts result in 504 Gateway Timeout, unreachable backends in 502

use std::any::Any;

use axum::{
    body::Body,
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Default error code when a handler does not declare one.
pub const DEFAULT_ERROR_CODE: i64 = 1;
/// Message used when an error carries none.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Error returned by any handler in the chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", or_unknown(.message))]
pub struct AppError {
    status: Option<StatusCode>,
    code: Option<i64>,
    message: String,
}

impl AppError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message).with_status(StatusCode::NOT_FOUND)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message).with_status(StatusCode::UNAUTHORIZED)
    }

    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn code(&self) -> i64 {
        self.code.unwrap_or(DEFAULT_ERROR_CODE)
    }

    pub fn message(&self) -> &str {
        or_unknown(&self.message)
    }

    /// The JSON body for this error.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            data: ErrorData {
                message: self.message().to_string(),
            },
        }
    }
}

fn or_unknown(message: &str) -> &str {
    if message.is_empty() {
        UNKNOWN_ERROR
    } else {
        message
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        let status = match e.kind() {
            std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(e.to_string()).with_status(status)
    }
}

/// Wire shape of an error response.
#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: i64,
    pub data: ErrorData,
}

#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ErrorData {
    pub message: String,
}

/// Marker attached to error responses so the boundary can log them.
#[derive(Debug, Clone)]
pub struct ErrorReport(pub AppError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();
        response.extensions_mut().insert(ErrorReport(self));
        response
    }
}

/// Success envelope used by the management API: `{"code": 0, "data": ...}`.
pub fn ok_response<T: Serialize>(data: T) -> Response {
    Json(json!({ "code": 0, "data": data })).into_response()
}

/// Bodies of framework-generated errors read into the message, at most.
const MAX_REJECTION_BODY: usize = 4096;

/// Rewrite an error response that did not come from an [`AppError`]
/// (method mismatch, body limit, extractor rejection) into the error body.
pub async fn ensure_error_body(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error())
        || response.extensions().get::<ErrorReport>().is_some()
    {
        return response;
    }

    let bytes = axum::body::to_bytes(response.into_body(), MAX_REJECTION_BODY)
        .await
        .unwrap_or_default();
    let text = String::from_utf8_lossy(&bytes);
    let message = match text.trim() {
        "" => status.canonical_reason().unwrap_or(UNKNOWN_ERROR).to_string(),
        reason => reason.to_string(),
    };
    AppError::new(message).with_status(status).into_response()
}

/// Outermost boundary: every failed request is logged here, once.
pub async fn error_boundary(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;

    if let Some(ErrorReport(err)) = response.extensions_mut().remove::<ErrorReport>() {
        if err.status().is_server_error() {
            tracing::error!(
                method = %method,
                path = %path,
                status = err.status().as_u16(),
                code = err.code(),
                error = %err,
                "Request failed"
            );
        } else {
            tracing::warn!(
                method = %method,
                path = %path,
                status = err.status().as_u16(),
                code = err.code(),
                error = %err,
                "Request rejected"
            );
        }
    }

    response
}

/// Panic handler for `CatchPanicLayer`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        String::new()
    };

    let mut response = AppError::new(message).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}
