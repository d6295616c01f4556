//! Built-in CORS interceptor.
//!
//! Permissive by default: whatever `Origin` the browser sends is written back,
//! credentials are allowed, and there is no allow-list. Services that need a
//! stricter policy register their own interceptor with
//! [`ChainBuilder::cors_interceptor`](super::ChainBuilder::cors_interceptor),
//! which replaces this one.
//!
//! `Access-Control-Allow-Methods` carries the echoed origin rather than a
//! method list. Existing clients depend on the header as it is, so it stays.

use async_trait::async_trait;
use http::HeaderMap;
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    HeaderValue, ORIGIN,
};

use super::{Flow, Interceptor};
use crate::request::Request;

/// Value of `Access-Control-Allow-Headers`.
pub const ALLOW_HEADERS: &str = "Origin,Content-Type,Accept,token,X-Requested-With";

/// Computes the CORS headers for a request carrying `origin`.
///
/// With no `Origin`, `Access-Control-Allow-Methods` is left out and the other
/// two headers are still present.
pub fn cors_headers(origin: Option<&HeaderValue>) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(3);
    if let Some(origin) = origin {
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, origin.clone());
    }
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    headers
}

/// The default CORS stage. Never halts.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCors;

#[async_trait]
impl Interceptor for DefaultCors {
    async fn pre_handle(&self, req: &Request, headers: &mut HeaderMap) -> Flow {
        for (name, value) in cors_headers(req.headers().get(ORIGIN)) {
            if let Some(name) = name {
                headers.insert(name, value);
            }
        }
        Flow::Continue
    }
}
