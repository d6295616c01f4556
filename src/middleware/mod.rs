//! Interceptor chain.
//!
//! Every request passes through a fixed sequence of interceptors before it is
//! routed:
//!
//! 1. the login interceptor, when the host registered one, unless the path is
//!    listed in `shape.except.login.urls`;
//! 2. the CORS interceptor, when `shape.cors.enable` is set, unless the path is
//!    listed in `shape.except.cors.urls`. The host's own CORS interceptor
//!    replaces [`DefaultCors`] when given.
//!
//! An interceptor answers [`Flow::Continue`] or [`Flow::Halt`]. Halting skips
//! every later stage and the handler; the interceptor supplies the response.
//! Headers a continuing stage writes end up on whatever response is sent.
//!
//! ```rust
//! use async_trait::async_trait;
//! use http::{HeaderMap, StatusCode};
//! use shape_web::middleware::{Flow, Interceptor, MiddlewareChain};
//! use shape_web::{Config, Request, Response};
//!
//! struct TokenGate;
//!
//! #[async_trait]
//! impl Interceptor for TokenGate {
//!     async fn pre_handle(&self, req: &Request, _headers: &mut HeaderMap) -> Flow {
//!         match req.header("token") {
//!             Some(_) => Flow::Continue,
//!             None => Flow::Halt(Response::status(StatusCode::UNAUTHORIZED)),
//!         }
//!     }
//! }
//!
//! let config = Config::from_properties([("shape.except.login.urls", "/health")]).unwrap();
//! let chain = MiddlewareChain::builder(&config).login_interceptor(TokenGate).build();
//! assert_eq!(chain.stage_names().collect::<Vec<_>>(), ["login"]);
//! ```

mod cors;

use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderMap;
use tracing::debug;

use crate::config::{Config, ExcludePaths};
use crate::request::Request;
use crate::response::Response;

pub use cors::{ALLOW_HEADERS, DefaultCors, cors_headers};

/// What an interceptor tells the chain.
#[derive(Debug)]
pub enum Flow {
    /// Run the next stage.
    Continue,
    /// Stop here and send this response.
    Halt(Response),
}

/// A pre-handler step.
///
/// `headers` collects response headers for the request; write to it to add
/// headers without stopping the chain.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn pre_handle(&self, req: &Request, headers: &mut HeaderMap) -> Flow;
}

/// Plain functions and closures work as interceptors.
#[async_trait]
impl<F> Interceptor for F
where
    F: Fn(&Request, &mut HeaderMap) -> Flow + Send + Sync + 'static,
{
    async fn pre_handle(&self, req: &Request, headers: &mut HeaderMap) -> Flow {
        self(req, headers)
    }
}

/// Result of running the chain.
#[derive(Debug)]
pub enum Outcome {
    /// Every stage continued. Apply these headers to the handler's response.
    Continue(HeaderMap),
    /// A stage halted with this response, headers already merged.
    Halt(Response),
}

struct Stage {
    name: &'static str,
    interceptor: Arc<dyn Interceptor>,
    excludes: ExcludePaths,
}

/// Ordered interceptors, built once at startup.
pub struct MiddlewareChain {
    stages: Vec<Stage>,
}

impl MiddlewareChain {
    pub fn builder(config: &Config) -> ChainBuilder {
        ChainBuilder { config: config.clone(), login: None, cors: None }
    }

    /// Builds the chain from optional host interceptors. `None` for login
    /// means no login stage; `None` for CORS means [`DefaultCors`].
    pub fn new(
        config: &Config,
        login: Option<Arc<dyn Interceptor>>,
        cors: Option<Arc<dyn Interceptor>>,
    ) -> Self {
        let mut stages = Vec::with_capacity(2);

        if let Some(interceptor) = login {
            stages.push(Stage {
                name: "login",
                interceptor,
                excludes: config.exclude_login_paths.clone(),
            });
        }

        if config.enable_cors {
            stages.push(Stage {
                name: "cors",
                interceptor: cors.unwrap_or_else(|| Arc::new(DefaultCors)),
                excludes: config.exclude_cors_paths.clone(),
            });
        }

        Self { stages }
    }

    /// Names of the active stages, in run order.
    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|s| s.name)
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs each stage once, in order, skipping stages whose exclusion list
    /// matches the request path.
    pub async fn run(&self, req: &Request) -> Outcome {
        let mut headers = HeaderMap::new();

        for stage in &self.stages {
            if stage.excludes.matches(req.path()) {
                debug!(stage = stage.name, path = req.path(), "stage skipped, path excluded");
                continue;
            }

            match stage.interceptor.pre_handle(req, &mut headers).await {
                Flow::Continue => {}
                Flow::Halt(mut res) => {
                    debug!(
                        stage = stage.name,
                        path = req.path(),
                        status = res.status_code().as_u16(),
                        "chain halted"
                    );
                    // The halting response keeps its own values for any
                    // header an earlier stage also wrote.
                    let own = std::mem::take(res.headers_mut());
                    res.merge_headers(headers);
                    res.merge_headers(own);
                    return Outcome::Halt(res);
                }
            }
        }

        Outcome::Continue(headers)
    }
}

/// Collects the optional host interceptors for a [`MiddlewareChain`].
pub struct ChainBuilder {
    config: Config,
    login: Option<Arc<dyn Interceptor>>,
    cors: Option<Arc<dyn Interceptor>>,
}

impl ChainBuilder {
    pub fn login_interceptor(mut self, interceptor: impl Interceptor) -> Self {
        self.login = Some(Arc::new(interceptor));
        self
    }

    /// Replaces [`DefaultCors`]. Ignored unless CORS is enabled.
    pub fn cors_interceptor(mut self, interceptor: impl Interceptor) -> Self {
        self.cors = Some(Arc::new(interceptor));
        self
    }

    pub fn build(self) -> MiddlewareChain {
        MiddlewareChain::new(&self.config, self.login, self.cors)
    }
}
