//! Built-in liveness endpoint.
//!
//! [`App::builder`](crate::App::builder) mounts [`health`] at `GET /health`
//! unless the router already serves that path. The route goes through the
//! interceptor chain like any other, so list `/health` in
//! `shape.except.login.urls` when a login interceptor is registered.

use crate::{Request, Response};

pub const PATH: &str = "/health";

/// Liveness probe. Always `200 OK` with body `"ok"`, no dependencies.
pub async fn health(_req: Request) -> Response {
    Response::text("ok")
}
