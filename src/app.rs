//! The assembled request pipeline.
//!
//! ```text
//! request ─▶ body cache ─▶ login ─▶ cors ─▶ router ─▶ handler
//!                            │        │        │ 404    │ Err / panic
//!                            └ halt ──┴────────┴────────┴──▶ error attributes
//! ```
//!
//! A halt goes through the error provider only when its response carries an
//! error, as `HttpError` and `Err(..)` responses do. Panics in interceptors
//! and handlers are caught and rendered as 500 payloads.
//!
//! [`App::builder`] is where a service plugs in its pieces. Everything it does
//! not supply falls back to a default: no login stage, [`DefaultCors`] when
//! CORS is enabled, [`DefaultErrorAttributes`], and `GET /health`.
//!
//! [`DefaultCors`]: crate::middleware::DefaultCors

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::Method;
use http::header::CONTENT_TYPE;
use tracing::error;

use crate::config::Config;
use crate::error_attributes::{self, DefaultErrorAttributes, ErrorAttributes, ErrorContext, HttpError};
use crate::health;
use crate::middleware::{ChainBuilder, Interceptor, MiddlewareChain, Outcome};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// Config, interceptor chain, routes and error provider. Read-only once
/// built; one `Arc<App>` is shared by every connection.
pub struct App {
    config: Arc<Config>,
    chain: MiddlewareChain,
    router: Router,
    error_attributes: Arc<dyn ErrorAttributes>,
}

impl App {
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder {
            chain: MiddlewareChain::builder(&config),
            config,
            router: Router::new(),
            error_attributes: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn chain(&self) -> &MiddlewareChain {
        &self.chain
    }

    /// Runs one request through the pipeline. Never fails: every problem
    /// becomes a response.
    pub async fn handle(&self, mut req: Request) -> Response {
        let method = req.method().clone();
        let path = req.path().to_owned();
        let ctx = ErrorContext { method: &method, path: &path };

        let outcome = match AssertUnwindSafe(self.chain.run(&req)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let err = Panicked::new("interceptor", panic);
                return error_attributes::render(self.error_attributes.as_ref(), &ctx, &err);
            }
        };

        let headers = match outcome {
            Outcome::Continue(headers) => headers,
            // The chain already merged its headers into a halting response.
            Outcome::Halt(mut res) => {
                if let Some(err) = res.error.take() {
                    let mut headers = std::mem::take(res.headers_mut());
                    headers.remove(CONTENT_TYPE);
                    res = error_attributes::render(self.error_attributes.as_ref(), &ctx, &*err);
                    res.merge_headers(headers);
                }
                return res;
            }
        };

        let Some((handler, params)) = self.router.lookup(&method, &path) else {
            let mut res = error_attributes::render(
                self.error_attributes.as_ref(),
                &ctx,
                &HttpError::not_found("No message available"),
            );
            res.merge_headers(headers);
            return res;
        };
        req.params = params;

        let mut res = match AssertUnwindSafe(handler.call(req)).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => Response::failure(Box::new(Panicked::new("handler", panic))),
        };

        if let Some(err) = res.error.take() {
            res = error_attributes::render(self.error_attributes.as_ref(), &ctx, &*err);
        }

        res.merge_headers(headers);
        res
    }
}

/// Collects the host's pieces for an [`App`].
pub struct AppBuilder {
    config: Config,
    chain: ChainBuilder,
    router: Router,
    error_attributes: Option<Arc<dyn ErrorAttributes>>,
}

impl AppBuilder {
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub fn login_interceptor(mut self, interceptor: impl Interceptor) -> Self {
        self.chain = self.chain.login_interceptor(interceptor);
        self
    }

    pub fn cors_interceptor(mut self, interceptor: impl Interceptor) -> Self {
        self.chain = self.chain.cors_interceptor(interceptor);
        self
    }

    pub fn error_attributes(mut self, provider: impl ErrorAttributes) -> Self {
        self.error_attributes = Some(Arc::new(provider));
        self
    }

    pub fn build(self) -> App {
        let mut router = self.router;
        if !router.has_route(&Method::GET, health::PATH) {
            router = router.get(health::PATH, health::health);
        }

        let chain = self.chain.build();
        tracing::info!(
            stages = ?chain.stage_names().collect::<Vec<_>>(),
            cors = self.config.enable_cors,
            "request pipeline ready"
        );

        App {
            config: Arc::new(self.config),
            chain,
            router,
            error_attributes: self
                .error_attributes
                .unwrap_or_else(|| Arc::new(DefaultErrorAttributes::default())),
        }
    }
}

/// A panic in a handler or an interceptor, carried to the error provider like
/// any other error.
#[derive(Debug)]
struct Panicked {
    site: &'static str,
    message: String,
}

impl Panicked {
    fn new(site: &'static str, panic: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = panic.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_owned()
        };
        error!(site, panic = %message, "request panicked");
        Self { site, message }
    }
}

impl fmt::Display for Panicked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} panicked: {}", self.site, self.message)
    }
}

impl std::error::Error for Panicked {}
