//! Incoming HTTP request type.

use std::collections::HashMap;
use std::io::Cursor;

use bytes::Bytes;
use http::{HeaderMap, Method};
use http_body::Body;

use crate::body::RequestBodyCache;
use crate::error::{BoxError, Error};

/// An incoming HTTP request.
///
/// The body sits behind a [`RequestBodyCache`], so interceptors may read it
/// through `&Request` and the handler still gets the full bytes afterwards.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: RequestBodyCache,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    /// Converts an `http::Request` with any byte-stream body. The body is not
    /// read until someone asks for it.
    pub fn from_http<B>(req: http::Request<B>) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers: parts.headers,
            body: RequestBodyCache::new(body),
            params: HashMap::new(),
        }
    }

    /// A request with an in-memory body.
    ///
    /// ```rust
    /// use shape_web::Request;
    /// use http::Method;
    ///
    /// let req = Request::new(Method::POST, "/users", "{}");
    /// assert_eq!(req.path(), "/users");
    /// ```
    pub fn new(method: Method, path: &str, body: impl Into<Bytes>) -> Self {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p.to_owned(), Some(q.to_owned())),
            None => (path.to_owned(), None),
        };
        Self {
            method,
            path,
            query,
            headers: HeaderMap::new(),
            body: RequestBodyCache::from_bytes(body),
            params: HashMap::new(),
        }
    }

    /// Adds a header, chaining. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::from_bytes(name.as_bytes()),
            http::HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    /// Case-insensitive header lookup. Values that are not visible ASCII read
    /// as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The full body. Safe to call any number of times, from any stage.
    pub async fn body(&self) -> Result<Bytes, Error> {
        self.body.bytes().await
    }

    /// A fresh cursor over the body, independent of every other reader.
    pub async fn body_reader(&self) -> Result<Cursor<Bytes>, Error> {
        self.body.reader().await
    }

    pub fn body_cache(&self) -> &RequestBodyCache {
        &self.body
    }
}
