//! Minimal shape-web service — a token-gated JSON endpoint, CORS and health.
//!
//! Run with:
//!   RUST_LOG=debug SHAPE_CORS_ENABLE=true SHAPE_EXCEPT_LOGIN_URLS=/health \
//!     cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/health
//!   curl -i http://localhost:3000/orders/7                       # 401
//!   curl -i -H 'token: t' -H 'Origin: https://app.example' http://localhost:3000/orders/7
//!   curl -i -H 'token: t' -X POST http://localhost:3000/orders -d ''   # 400 payload

use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use shape_web::middleware::{Flow, Interceptor};
use shape_web::{App, Config, HttpError, Request, Response, Router, Server};

/// Lets a request through when it carries a `token` header.
struct TokenLogin;

#[async_trait]
impl Interceptor for TokenLogin {
    async fn pre_handle(&self, req: &Request, _headers: &mut HeaderMap) -> Flow {
        match req.header("token") {
            Some(token) if !token.is_empty() => Flow::Continue,
            _ => Flow::Halt(
                Response::builder()
                    .status(StatusCode::UNAUTHORIZED)
                    .text("login required"),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), shape_web::Error> {
    tracing_subscriber::fmt::init();

    let app = App::builder(Config::load("shape.toml")?)
        .router(
            Router::new()
                .get("/orders/{id}", get_order)
                .post("/orders", create_order),
        )
        .login_interceptor(TokenLogin)
        .build();

    Server::bind("0.0.0.0:3000").serve(app).await
}

// GET /orders/{id}
async fn get_order(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","status":"open"}}"#))
}

// POST /orders
//
// Errors go through the error-attributes provider and come back as JSON.
async fn create_order(req: Request) -> Result<Response, HttpError> {
    let body = req
        .body()
        .await
        .map_err(|_| HttpError::bad_request("unreadable body"))?;
    if body.is_empty() {
        return Err(HttpError::bad_request("order is empty"));
    }

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/orders/99")
        .json(body))
}
