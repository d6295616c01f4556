//! # shape-web
//!
//! The request pipeline every shape service runs behind its reverse proxy:
//! an optional login gate, a switchable CORS stage, a re-readable request
//! body, structured error payloads and a liveness endpoint. Services bring
//! their routes and, if they want, their own interceptors.
//!
//! ## What the proxy owns
//!
//! nginx / ingress handles TLS, rate limiting, slow clients and body-size
//! limits. The body cache buffers whatever it is given, so set
//! `client_max_body_size`.
//!
//! ## Configuration
//!
//! | Key | Default | Effect |
//! |---|---|---|
//! | `shape.cors.enable` | `false` | runs the CORS stage |
//! | `shape.except.login.urls` | empty | comma list of paths the login stage skips |
//! | `shape.except.cors.urls` | empty | comma list of paths the CORS stage skips |
//!
//! Each key is also read from the environment as `SHAPE_CORS_ENABLE` and so
//! on. [`Config::load`] layers the environment over a TOML file.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::{HeaderMap, StatusCode};
//! use shape_web::middleware::Flow;
//! use shape_web::{App, Config, HttpError, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), shape_web::Error> {
//!     let config = Config::from_env()?;
//!
//!     let app = App::builder(config)
//!         .router(Router::new().post("/orders", create_order))
//!         .login_interceptor(|req: &Request, _: &mut HeaderMap| match req.header("token") {
//!             Some(_) => Flow::Continue,
//!             None => Flow::Halt(Response::status(StatusCode::UNAUTHORIZED)),
//!         })
//!         .build();
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn create_order(req: Request) -> Result<Response, HttpError> {
//!     let body = req.body().await.map_err(|_| HttpError::bad_request("unreadable body"))?;
//!     if body.is_empty() {
//!         return Err(HttpError::bad_request("order is empty"));
//!     }
//!     Ok(Response::builder().status(StatusCode::CREATED).json(body))
//! }
//! ```

mod app;
mod body;
mod config;
mod error;
mod error_attributes;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod health;
pub mod middleware;

pub use app::{App, AppBuilder};
pub use body::RequestBodyCache;
pub use config::{Config, ExcludePaths};
pub use error::{BoxError, Error};
pub use error_attributes::{DefaultErrorAttributes, ErrorAttributes, ErrorContext, HttpError};
pub use handler::Handler;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
