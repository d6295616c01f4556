//! Structured error payloads for failed handlers.
//!
//! When a handler returns `Err(_)`, returns an [`HttpError`], or panics, the
//! app asks an [`ErrorAttributes`] provider for the JSON body to send. The
//! default provider produces:
//!
//! ```json
//! {
//!   "timestamp": "2024-05-01T12:00:00Z",
//!   "status": 500,
//!   "error": "Internal Server Error",
//!   "message": "No message available",
//!   "path": "/orders"
//! }
//! ```
//!
//! Rendering never fails. If a provider panics, the response falls back to
//! `{"status":500,"error":"Internal Server Error"}`.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use http::{Method, StatusCode};
use serde_json::{Map, Value, json};
use tracing::{debug, error};

use crate::response::{IntoResponse, Response};

const NO_MESSAGE: &str = "No message available";

/// Where the failure happened.
#[derive(Clone, Copy, Debug)]
pub struct ErrorContext<'a> {
    pub method: &'a Method,
    pub path: &'a str,
}

/// Builds the error payload for an unhandled handler error.
///
/// A `status` entry holding a 4xx or 5xx code sets the response status;
/// anything else leaves it at 500.
pub trait ErrorAttributes: Send + Sync + 'static {
    fn error_attributes(
        &self,
        ctx: &ErrorContext<'_>,
        error: &(dyn StdError + Send + Sync + 'static),
    ) -> Map<String, Value>;
}

/// The stock payload: `timestamp`, `status`, `error`, `message`, `path`.
///
/// Messages of arbitrary errors are hidden unless `include_message` is set;
/// an [`HttpError`]'s message is always shown since it was written for the
/// client.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultErrorAttributes {
    pub include_message: bool,
}

impl DefaultErrorAttributes {
    pub fn with_messages() -> Self {
        Self { include_message: true }
    }
}

impl ErrorAttributes for DefaultErrorAttributes {
    fn error_attributes(
        &self,
        ctx: &ErrorContext<'_>,
        error: &(dyn StdError + Send + Sync + 'static),
    ) -> Map<String, Value> {
        let (status, message) = match error.downcast_ref::<HttpError>() {
            Some(http) => (http.status, http.message.to_string()),
            None if self.include_message => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
            None => (StatusCode::INTERNAL_SERVER_ERROR, NO_MESSAGE.to_owned()),
        };

        let mut attrs = Map::new();
        attrs.insert("timestamp".into(), json!(jiff::Timestamp::now().to_string()));
        attrs.insert("status".into(), json!(status.as_u16()));
        attrs.insert("error".into(), json!(status.canonical_reason().unwrap_or("Unknown")));
        attrs.insert("message".into(), json!(message));
        attrs.insert("path".into(), json!(ctx.path));
        attrs
    }
}

/// Turns a handler failure into the response sent to the client.
pub(crate) fn render(
    provider: &dyn ErrorAttributes,
    ctx: &ErrorContext<'_>,
    err: &(dyn StdError + Send + Sync + 'static),
) -> Response {
    let attrs = match catch_unwind(AssertUnwindSafe(|| provider.error_attributes(ctx, err))) {
        Ok(attrs) => attrs,
        Err(_) => {
            error!(path = ctx.path, "error attributes provider panicked, sending fallback");
            return fallback();
        }
    };

    let status = attrs
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .filter(|code| code.is_client_error() || code.is_server_error())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        error!(method = %ctx.method, path = ctx.path, error = %err, "unhandled request error");
    } else {
        debug!(method = %ctx.method, path = ctx.path, status = status.as_u16(), error = %err, "request failed");
    }

    match serde_json::to_vec(&attrs) {
        Ok(body) => Response::builder().status(status).json(body),
        Err(e) => {
            error!(path = ctx.path, error = %e, "error payload did not serialize, sending fallback");
            fallback()
        }
    }
}

fn fallback() -> Response {
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    Response::builder()
        .status(status)
        .json(json!({ "status": status.as_u16(), "error": "Internal Server Error" }).to_string())
}

// ── HttpError ─────────────────────────────────────────────────────────────────

/// A handler failure with a chosen status and a client-facing message.
///
/// ```rust
/// use http::StatusCode;
/// use shape_web::{HttpError, Request};
///
/// async fn create_user(req: Request) -> Result<&'static str, HttpError> {
///     let body = req.body().await.map_err(|_| HttpError::bad_request("unreadable body"))?;
///     if body.is_empty() {
///         return Err(HttpError::bad_request("name is required"));
///     }
///     Ok("created")
/// }
/// ```
#[derive(Clone, Debug)]
pub struct HttpError {
    status: StatusCode,
    message: Cow<'static, str>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &str { &self.message }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl StdError for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        Response::failure(Box::new(self))
    }
}
